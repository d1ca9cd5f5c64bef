//! Functions and the call dispatcher.
//!
//! A call chain steals owned inputs from the caller, threads them
//! through one or more call blocks (each a `call` or `uncall` of a
//! named function), and finally binds the produced outputs back into
//! the caller. Borrowed arguments are aliased, never consumed. A call
//! block carrying a thread-count expression dispatches in parallel:
//! stolen inputs are split element-wise across workers and results are
//! reassembled into arrays of one element per thread.

use std::{sync::Arc, thread};

use indexmap::IndexMap;
use num_traits::ToPrimitive;

use crate::{
    coordination::{ThreadContext, ThreadManager},
    exception::{ErrorKind, RailwayError, StackFrame},
    expressions::Expr,
    scope::{Scope, Variable},
    statements::{Line, RunError, RunResult, run_lines},
    value::MemoryCell,
};

/// A function parameter or caller-side argument name, with the mono
/// mark its leading `.` implies.
#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub name: String,
    pub is_mono: bool,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let is_mono = name.starts_with('.');
        Self { name, is_mono }
    }
}

/// A compiled function: three parameter lists and a body.
#[derive(Debug)]
pub(crate) struct Function {
    pub name: String,
    pub borrowed_params: Vec<Param>,
    pub in_params: Vec<Param>,
    pub out_params: Vec<Param>,
    pub lines: Vec<Line>,
    /// Whether the body ever modifies a non-mono variable; an uncall of
    /// a function that does not is a no-op.
    pub mod_reverse: bool,
}

/// The module's function registry, iterated in definition order.
pub(crate) type FunctionTable = IndexMap<String, Arc<Function>>;

/// One `call f(...)` or `uncall f(...)` link in a call chain.
#[derive(Debug)]
pub(crate) struct CallBlock {
    pub uncall: bool,
    pub name: String,
    /// Present on parallel calls: `call f{n}(...)`.
    pub num_threads: Option<Expr>,
    pub borrowed: Vec<Param>,
}

/// A full call statement: `(in) => call f(...) => call g(...) => (out)`.
#[derive(Debug)]
pub(crate) struct CallStmt {
    pub in_params: Vec<Param>,
    pub blocks: Vec<CallBlock>,
    pub out_params: Vec<Param>,
}

impl CallStmt {
    pub fn eval(&self, scope: &mut Scope, backwards: bool) -> RunResult<bool> {
        // Reversing a chain swaps the ends and walks the blocks the
        // other way; each block's own direction is uncall XOR outer.
        let (inputs, outputs) = if backwards {
            (&self.out_params, &self.in_params)
        } else {
            (&self.in_params, &self.out_params)
        };

        let mut travelling: Vec<Variable> = Vec::with_capacity(inputs.len());
        for param in inputs {
            travelling.push(steal(scope, param)?);
        }

        let mut order: Vec<&CallBlock> = self.blocks.iter().collect();
        if backwards {
            order.reverse();
        }
        for block in order {
            let func = scope.functions.get(&block.name).cloned().ok_or_else(|| {
                scope.error(
                    ErrorKind::UndefinedFunction,
                    format!("Function \"{}\" is not defined", block.name),
                )
            })?;
            let direction = block.uncall ^ backwards;
            travelling = match &block.num_threads {
                Some(expr) => parallel_call(scope, &func, direction, travelling, &block.borrowed, expr)?,
                None => single_call(scope, &func, direction, travelling, &block.borrowed)?,
            };
        }

        if travelling.len() != outputs.len() {
            return Err(scope
                .error(
                    ErrorKind::CallError,
                    format!(
                        "Call chain produced {} values but binds {}",
                        travelling.len(),
                        outputs.len()
                    ),
                )
                .into());
        }
        for (param, var) in outputs.iter().zip(travelling) {
            check_mono(scope, var.is_mono, param)?;
            scope.assign(&param.name, var.with_mono(param.is_mono))?;
        }
        Ok(backwards)
    }
}

/// Removes an owned variable from the caller for transfer to a callee.
fn steal(scope: &mut Scope, param: &Param) -> RunResult<Variable> {
    let var = scope.lookup_frame(&param.name)?;
    if var.is_borrowed {
        return Err(scope
            .error(
                ErrorKind::ReferenceOwnership,
                format!("Stealing borrowed reference \"{}\"", param.name),
            )
            .into());
    }
    Ok(scope.remove(&param.name)?)
}

/// Mono marks on values and parameter slots must agree: mono data must
/// not leak into reversible code, and reversible data gains nothing
/// from a mono slot it can never leave.
fn check_mono(scope: &Scope, value_is_mono: bool, param: &Param) -> RunResult<()> {
    if value_is_mono && !param.is_mono {
        return Err(scope
            .error(
                ErrorKind::IllegalMono,
                format!("Mono value bound to non-mono name \"{}\"", param.name),
            )
            .into());
    }
    if !value_is_mono && param.is_mono {
        return Err(scope
            .error(
                ErrorKind::ExpectedMono,
                format!("Non-mono value bound to mono name \"{}\"", param.name),
            )
            .into());
    }
    Ok(())
}

fn check_arity(
    scope: &Scope,
    func: &Function,
    backwards: bool,
    stolen: usize,
    borrowed: usize,
) -> RunResult<()> {
    let expected = if backwards {
        func.out_params.len()
    } else {
        func.in_params.len()
    };
    if stolen != expected {
        return Err(scope
            .error(
                ErrorKind::CallError,
                format!(
                    "Function \"{}\" takes {expected} stolen arguments but received {stolen}",
                    func.name
                ),
            )
            .into());
    }
    if borrowed != func.borrowed_params.len() {
        return Err(scope
            .error(
                ErrorKind::CallError,
                format!(
                    "Function \"{}\" takes {} borrowed arguments but received {borrowed}",
                    func.name,
                    func.borrowed_params.len()
                ),
            )
            .into());
    }
    Ok(())
}

fn single_call(
    scope: &mut Scope,
    func: &Arc<Function>,
    backwards: bool,
    stolen: Vec<Variable>,
    borrowed_args: &[Param],
) -> RunResult<Vec<Variable>> {
    check_arity(scope, func, backwards, stolen.len(), borrowed_args.len())?;

    let mut borrowed = Vec::with_capacity(borrowed_args.len());
    for (param, arg) in func.borrowed_params.iter().zip(borrowed_args) {
        let var = scope.lookup(&arg.name)?;
        check_mono(scope, var.is_mono, param)?;
        borrowed.push(var.alias(param.is_mono));
    }

    let mut trace = scope.trace().to_vec();
    trace.push(match &scope.threads {
        Some(ctx) => StackFrame::in_thread(func.name.clone(), ctx.thread_id),
        None => StackFrame::new(func.name.clone()),
    });
    let mut child = Scope::new(
        func.name.clone(),
        scope.globals.clone(),
        scope.functions.clone(),
        trace,
        scope.threads.clone(),
        scope.writer.clone(),
    );
    execute_function(&mut child, func, backwards, stolen, borrowed)
}

/// Binds parameters into a fresh callee scope, runs the body in the
/// requested direction, enforces the leak discipline, and collects the
/// declared return set.
pub(crate) fn execute_function(
    child: &mut Scope,
    func: &Function,
    backwards: bool,
    stolen: Vec<Variable>,
    borrowed: Vec<Variable>,
) -> RunResult<Vec<Variable>> {
    let params = if backwards { &func.out_params } else { &func.in_params };
    debug_assert_eq!(params.len(), stolen.len());
    for (param, var) in params.iter().zip(stolen) {
        check_mono(child, var.is_mono, param)?;
        child.assign(&param.name, var.with_mono(param.is_mono))?;
    }
    for (param, var) in func.borrowed_params.iter().zip(borrowed) {
        child.assign(&param.name, var)?;
    }

    run_lines(&func.lines, child, backwards)?;

    let return_params = if backwards { &func.in_params } else { &func.out_params };
    let phase = if backwards { "an uncall" } else { "a call" };
    for (name, var) in child.locals() {
        if !var.is_borrowed && !return_params.iter().any(|p| &p.name == name) {
            return Err(child
                .error(
                    ErrorKind::LeakedInformation,
                    format!(
                        "Variable \"{name}\" is still in scope of function {} at the end of {phase}",
                        func.name
                    ),
                )
                .into());
        }
    }
    let mut returned = Vec::with_capacity(return_params.len());
    for param in return_params {
        let var = child.remove(&param.name).map_err(|_| {
            child.error(
                ErrorKind::UndefinedVariable,
                format!(
                    "Parameter \"{}\" is not in scope of function {} at the end of {phase}",
                    param.name, func.name
                ),
            )
        })?;
        if var.is_borrowed {
            return Err(child
                .error(
                    ErrorKind::ReferenceOwnership,
                    format!("Returning borrowed reference \"{}\"", param.name),
                )
                .into());
        }
        check_mono(child, var.is_mono, param)?;
        returned.push(var);
    }
    Ok(returned)
}

fn parallel_call(
    scope: &mut Scope,
    func: &Arc<Function>,
    backwards: bool,
    stolen: Vec<Variable>,
    borrowed_args: &[Param],
    num_threads: &Expr,
) -> RunResult<Vec<Variable>> {
    let requested = num_threads.eval_number(scope, "{threads}")?;
    let count = requested
        .truncate()
        .to_usize()
        .filter(|count| *count > 0)
        .ok_or_else(|| {
            scope.error(
                ErrorKind::ValueError,
                format!("Thread count {requested} is not a positive integer"),
            )
        })?;
    check_arity(scope, func, backwards, stolen.len(), borrowed_args.len())?;

    let params = if backwards { &func.out_params } else { &func.in_params };
    // Split each stolen input across the workers: element i of every
    // input array becomes thread i's owned argument.
    let mut slices: Vec<Vec<Variable>> = (0..count)
        .map(|_| Vec::with_capacity(params.len()))
        .collect();
    for (param, var) in params.iter().zip(stolen) {
        let cells = match var.into_cell() {
            MemoryCell::Array(cells) if cells.len() == count => cells,
            MemoryCell::Array(cells) => {
                return Err(scope
                    .error(
                        ErrorKind::ValueError,
                        format!(
                            "Parallel input \"{}\" has length {} but the call spawns {count} threads",
                            param.name,
                            cells.len()
                        ),
                    )
                    .into());
            }
            MemoryCell::Num(_) => {
                return Err(scope
                    .error(
                        ErrorKind::ValueError,
                        format!(
                            "Parallel input \"{}\" must be an array of length {count}",
                            param.name
                        ),
                    )
                    .into());
            }
        };
        for (slice, cell) in slices.iter_mut().zip(cells) {
            slice.push(Variable::from_cell(cell, param.is_mono));
        }
    }

    // Borrowed parameters are shared: every worker aliases the same
    // memory. The runtime does not synchronise these accesses.
    let mut borrowed = Vec::with_capacity(borrowed_args.len());
    for (param, arg) in func.borrowed_params.iter().zip(borrowed_args) {
        let var = scope.lookup(&arg.name)?;
        check_mono(scope, var.is_mono, param)?;
        borrowed.push(var.alias(param.is_mono));
    }

    let manager = Arc::new(ThreadManager::new(count));
    let results: Vec<RunResult<Vec<Variable>>> = thread::scope(|threads| {
        let handles: Vec<_> = slices
            .into_iter()
            .enumerate()
            .map(|(thread_id, slice)| {
                let manager = Arc::clone(&manager);
                let func = Arc::clone(func);
                let borrowed = borrowed.clone();
                let globals = scope.globals.clone();
                let functions = scope.functions.clone();
                let writer = scope.writer.clone();
                let mut trace = scope.trace().to_vec();
                trace.push(StackFrame::in_thread(func.name.clone(), thread_id));
                threads.spawn(move || {
                    let mut child = Scope::new(
                        func.name.clone(),
                        globals,
                        functions,
                        trace,
                        Some(ThreadContext {
                            manager: Arc::clone(&manager),
                            thread_id,
                        }),
                        writer,
                    );
                    let result = execute_function(&mut child, &func, backwards, slice, borrowed);
                    if result.is_err() {
                        // Wake peers blocked on barriers or mutex turns
                        // so they abort instead of waiting forever.
                        manager.abort();
                    }
                    result
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(RunError::Error(RailwayError::bare(
                        ErrorKind::Sympathetic,
                        "A worker thread terminated abnormally",
                    )))
                })
            })
            .collect()
    });

    // Re-raise the first genuine error; sympathetic aborts only matter
    // when no thread recorded the original failure.
    let mut outputs = Vec::with_capacity(count);
    let mut fallback: Option<RunError> = None;
    for result in results {
        match result {
            Ok(vars) => outputs.push(vars),
            Err(RunError::Error(err)) if err.kind != ErrorKind::Sympathetic => {
                return Err(RunError::Error(err));
            }
            Err(err) => {
                if fallback.is_none() {
                    fallback = Some(err);
                }
            }
        }
    }
    if let Some(err) = fallback {
        return Err(err);
    }

    // Collect one output array per out-parameter, element i from
    // thread i, preserving each thread's value shape.
    let return_params = if backwards { &func.in_params } else { &func.out_params };
    let mut columns: Vec<Vec<MemoryCell>> = (0..return_params.len())
        .map(|_| Vec::with_capacity(count))
        .collect();
    for thread_output in outputs {
        for (column, var) in columns.iter_mut().zip(thread_output) {
            column.push(var.into_cell());
        }
    }
    Ok(columns
        .into_iter()
        .zip(return_params)
        .map(|(cells, param)| Variable::array(cells, param.is_mono))
        .collect())
}
