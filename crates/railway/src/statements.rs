//! The compiled statement tree and its bidirectional evaluator.
//!
//! Every statement evaluates with `(scope, backwards)` and returns the
//! possibly-updated direction; the line-runner walks a sequence up or
//! down according to that flag and guards direction changes against
//! live mono variables. Reversibility rests on the pairings here:
//! backward `let` is forward `unlet`, backward `push` is forward `pop`,
//! each modification operator runs as its inverse, and control
//! structures check their exit assertions at the matching boundary.

use num_bigint::BigInt;
use num_traits::Signed;
use smallvec::SmallVec;

use crate::{
    coordination::CoordinationError,
    exception::{ErrorKind, RailwayError},
    expressions::{BinaryOp, Expr, IterSource, Lookup},
    function::CallStmt,
    scope::{Scope, Variable},
    value::{ArithmeticError, CellMismatch, MemoryCell, Number},
};

/// Non-local exits from statement evaluation: a real runtime error, or
/// the control-flow signal raised by `catch` and consumed by `try`.
#[derive(Debug)]
pub(crate) enum RunError {
    Error(RailwayError),
    /// A `catch` condition fired; the enclosing `try` restarts with the
    /// next iterator element.
    Caught,
}

impl From<RailwayError> for RunError {
    fn from(err: RailwayError) -> Self {
        Self::Error(err)
    }
}

impl RunError {
    /// Collapses into a plain error at an interpreter boundary where
    /// `Caught` can no longer occur (the compiler confines `catch` to
    /// `try` bodies).
    pub fn into_error(self) -> RailwayError {
        match self {
            Self::Error(err) => err,
            Self::Caught => RailwayError::bare(
                ErrorKind::FailedAssertion,
                "catch fired outside of a try statement",
            ),
        }
    }
}

pub(crate) type RunResult<T> = Result<T, RunError>;

/// One statement plus the compile-time direction flags.
///
/// A mono line executes only forwards; a line that never modifies
/// non-mono state has nothing to reverse. Both become no-ops when the
/// evaluator runs backwards.
#[derive(Debug)]
pub(crate) struct Line {
    pub stmt: Statement,
    pub is_mono: bool,
    pub mod_reverse: bool,
}

impl Line {
    pub fn eval(&self, scope: &mut Scope, backwards: bool) -> RunResult<bool> {
        if backwards && (self.is_mono || !self.mod_reverse) {
            return Ok(backwards);
        }
        self.stmt.eval(scope, backwards)
    }
}

/// Walks a line sequence in the given direction.
///
/// Each line may return a new direction; on a change the runner first
/// checks that no mono variable is live (mono bindings must not witness
/// the arrow of time flip), then continues walking the other way. The
/// walk ends when the index leaves the sequence, and the final
/// direction is returned.
pub(crate) fn run_lines(lines: &[Line], scope: &mut Scope, mut backwards: bool) -> RunResult<bool> {
    let mut index: isize = if backwards { lines.len() as isize - 1 } else { 0 };
    while index >= 0 && index < lines.len() as isize {
        let next = lines[index as usize].eval(scope, backwards)?;
        if next != backwards {
            mono_guard(scope, "mid-sequence")?;
            backwards = next;
        }
        index += if backwards { -1 } else { 1 };
    }
    Ok(backwards)
}

/// Runs a body that must keep its direction (loop, for, try and if
/// bodies). A flip inside one of these would desynchronise the
/// construct's own bookkeeping, so it is a direction-change error.
fn run_lines_fixed(
    lines: &[Line],
    scope: &mut Scope,
    backwards: bool,
    construct: &str,
) -> RunResult<()> {
    let end = run_lines(lines, scope, backwards)?;
    if end != backwards {
        return Err(scope
            .error(
                ErrorKind::DirectionChange,
                format!("Direction of time changed inside a {construct} body"),
            )
            .into());
    }
    Ok(())
}

fn mono_guard(scope: &Scope, context: &str) -> RunResult<()> {
    match scope.live_mono_name() {
        Some(name) => Err(scope
            .error(
                ErrorKind::DirectionChange,
                format!(
                    "Changing the direction of time {context} whilst mono variable \"{name}\" is in scope"
                ),
            )
            .into()),
        None => Ok(()),
    }
}

/// Modification operators (`x op= expr`).
///
/// `+=`, `-=`, `*=`, `/=` and `^=` have self-contained inverses; the
/// rest are only legal on mono statements, which never run in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Pow,
    Mod,
    Xor,
    Or,
    And,
}

impl ModOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mul => "*=",
            Self::Div => "/=",
            Self::IDiv => "//=",
            Self::Pow => "**=",
            Self::Mod => "%=",
            Self::Xor => "^=",
            Self::Or => "|=",
            Self::And => "&=",
        }
    }

    pub fn invertible(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Xor)
    }

    fn inverse(self) -> Self {
        match self {
            Self::Add => Self::Sub,
            Self::Sub => Self::Add,
            Self::Mul => Self::Div,
            Self::Div => Self::Mul,
            Self::Xor => Self::Xor,
            // The compiler rejects reversal of the rest outright.
            other => other,
        }
    }

    fn apply(self, lhs: &Number, rhs: &Number) -> Result<Number, ArithmeticError> {
        match self {
            // Multiplying by zero would destroy the value irrecoverably.
            Self::Mul if rhs.is_zero() => Err(ArithmeticError::DivisionByZero),
            Self::Add => Ok(lhs.add(rhs)),
            Self::Sub => Ok(lhs.sub(rhs)),
            Self::Mul => Ok(lhs.mul(rhs)),
            Self::Div => lhs.div(rhs),
            Self::IDiv => lhs.floor_div(rhs),
            Self::Pow => lhs.pow(rhs),
            Self::Mod => lhs.rem(rhs),
            Self::Xor => BinaryOp::Xor.apply(lhs, rhs),
            Self::Or => BinaryOp::Or.apply(lhs, rhs),
            Self::And => BinaryOp::And.apply(lhs, rhs),
        }
    }
}

/// One item of a `print`/`println` argument list.
#[derive(Debug)]
pub(crate) enum PrintItem {
    Text(String),
    Value(Expr),
}

#[derive(Debug)]
pub(crate) struct BindingStmt {
    pub name: String,
    pub mono_name: bool,
    pub rhs: Expr,
}

#[derive(Debug)]
pub(crate) struct ModopStmt {
    pub lookup: Lookup,
    pub op: ModOp,
    pub expr: Expr,
}

#[derive(Debug)]
pub(crate) struct TransferStmt {
    pub src: Lookup,
    pub dst: Lookup,
}

#[derive(Debug)]
pub(crate) struct SwapStmt {
    pub lhs: Lookup,
    pub rhs: Lookup,
    /// Final index of each side, split off so the location (not the
    /// value) can be addressed.
    pub lhs_tail: Option<Expr>,
    pub rhs_tail: Option<Expr>,
}

#[derive(Debug)]
pub(crate) struct PromoteStmt {
    pub src: String,
    pub dst: String,
}

#[derive(Debug)]
pub(crate) struct IfStmt {
    pub enter: Expr,
    pub lines: Vec<Line>,
    pub else_lines: Vec<Line>,
    pub exit: Expr,
    pub is_mono: bool,
}

#[derive(Debug)]
pub(crate) struct LoopStmt {
    pub forward: Expr,
    pub lines: Vec<Line>,
    pub backward: Expr,
    pub is_mono: bool,
}

#[derive(Debug)]
pub(crate) struct ForStmt {
    pub name: String,
    pub mono_name: bool,
    pub iterator: Expr,
    pub lines: Vec<Line>,
}

#[derive(Debug)]
pub(crate) struct TryStmt {
    pub name: String,
    pub mono_name: bool,
    pub iterator: Expr,
    pub lines: Vec<Line>,
}

#[derive(Debug)]
pub(crate) struct DoUndoStmt {
    pub do_lines: Vec<Line>,
    pub yield_lines: Vec<Line>,
}

#[derive(Debug)]
pub(crate) struct PrintStmt {
    pub items: Vec<PrintItem>,
    pub newline: bool,
}

#[derive(Debug)]
pub(crate) struct MutexStmt {
    pub name: String,
    pub lines: Vec<Line>,
}

#[derive(Debug)]
pub(crate) enum Statement {
    Let(BindingStmt),
    Unlet(BindingStmt),
    Modop(ModopStmt),
    Push(TransferStmt),
    Pop(TransferStmt),
    Swap(SwapStmt),
    Promote(PromoteStmt),
    If(IfStmt),
    Loop(LoopStmt),
    For(ForStmt),
    Try(TryStmt),
    Catch(Expr),
    DoUndo(DoUndoStmt),
    Print(PrintStmt),
    Barrier(String),
    Mutex(MutexStmt),
    Call(CallStmt),
}

impl Statement {
    pub fn eval(&self, scope: &mut Scope, backwards: bool) -> RunResult<bool> {
        match self {
            Self::Let(stmt) => {
                if backwards {
                    unlet_eval(stmt, scope)?;
                } else {
                    let_eval(stmt, scope)?;
                }
                Ok(backwards)
            }
            Self::Unlet(stmt) => {
                if backwards {
                    let_eval(stmt, scope)?;
                } else {
                    unlet_eval(stmt, scope)?;
                }
                Ok(backwards)
            }
            Self::Modop(stmt) => {
                modop_eval(stmt, scope, backwards)?;
                Ok(backwards)
            }
            Self::Push(stmt) => {
                if backwards {
                    pop_eval(scope, &stmt.dst, &stmt.src)?;
                } else {
                    push_eval(scope, &stmt.src, &stmt.dst)?;
                }
                Ok(backwards)
            }
            Self::Pop(stmt) => {
                if backwards {
                    push_eval(scope, &stmt.dst, &stmt.src)?;
                } else {
                    pop_eval(scope, &stmt.src, &stmt.dst)?;
                }
                Ok(backwards)
            }
            Self::Swap(stmt) => {
                swap_eval(stmt, scope)?;
                Ok(backwards)
            }
            Self::Promote(stmt) => {
                promote_eval(stmt, scope, backwards)?;
                Ok(backwards)
            }
            Self::If(stmt) => if_eval(stmt, scope, backwards),
            Self::Loop(stmt) => loop_eval(stmt, scope, backwards),
            Self::For(stmt) => for_eval(stmt, scope, backwards),
            Self::Try(stmt) => try_eval(stmt, scope, backwards),
            Self::Catch(expr) => {
                if !backwards && expr.eval_number(scope, "catch")?.truthy() {
                    return Err(RunError::Caught);
                }
                Ok(backwards)
            }
            Self::DoUndo(stmt) => do_undo_eval(stmt, scope, backwards),
            Self::Print(stmt) => {
                if !backwards {
                    print_eval(stmt, scope)?;
                }
                Ok(backwards)
            }
            Self::Barrier(name) => {
                barrier_eval(name, scope)?;
                Ok(backwards)
            }
            Self::Mutex(stmt) => mutex_eval(stmt, scope, backwards),
            Self::Call(stmt) => stmt.eval(scope, backwards),
        }
    }
}

fn let_eval(stmt: &BindingStmt, scope: &mut Scope) -> RunResult<()> {
    let value = stmt.rhs.eval(scope)?;
    scope.assign(&stmt.name, Variable::from_cell(value, stmt.mono_name))?;
    Ok(())
}

fn unlet_eval(stmt: &BindingStmt, scope: &mut Scope) -> RunResult<()> {
    let var = scope.lookup_frame(&stmt.name)?;
    if var.is_borrowed {
        return Err(scope
            .error(
                ErrorKind::ReferenceOwnership,
                format!("Unletting borrowed reference \"{}\"", stmt.name),
            )
            .into());
    }
    let expected = stmt.rhs.eval(scope)?;
    match var.value_cell().matches(&expected) {
        Ok(()) => {}
        Err(CellMismatch::Shape) => {
            return Err(scope
                .error(
                    ErrorKind::TypeError,
                    format!(
                        "Unletting \"{}\" using an expression of incorrect shape",
                        stmt.name
                    ),
                )
                .into());
        }
        Err(CellMismatch::Value) => {
            return Err(scope
                .error(
                    ErrorKind::ValueError,
                    format!("Value mismatch during unlet of \"{}\"", stmt.name),
                )
                .into());
        }
    }
    scope.remove(&stmt.name)?;
    Ok(())
}

fn modop_eval(stmt: &ModopStmt, scope: &mut Scope, backwards: bool) -> RunResult<()> {
    debug_assert!(
        !backwards || stmt.op.invertible(),
        "non-invertible modop reached in reverse"
    );
    let op = if backwards { stmt.op.inverse() } else { stmt.op };
    let current = match stmt.lookup.eval(scope)? {
        MemoryCell::Num(value) => value,
        MemoryCell::Array(_) => {
            return Err(scope
                .error(
                    ErrorKind::TypeError,
                    format!(
                        "Modification \"{}\" targets array \"{}\"",
                        op.symbol(),
                        stmt.lookup.name
                    ),
                )
                .into());
        }
    };
    let rhs = stmt.expr.eval_number(scope, op.symbol())?;
    let result = op.apply(&current, &rhs).map_err(|err| match err {
        ArithmeticError::DivisionByZero => scope.error(
            ErrorKind::ZeroError,
            format!(
                "{} variable \"{}\" by zero",
                if matches!(op, ModOp::Mul) { "Multiplying" } else { "Dividing" },
                stmt.lookup.name
            ),
        ),
        ArithmeticError::NonRational => scope.error(
            ErrorKind::ValueError,
            "Result of \"**=\" is not a rational number",
        ),
        ArithmeticError::ExponentOverflow => scope.error(
            ErrorKind::ValueError,
            "Exponent too large for exact arithmetic",
        ),
    })?;
    stmt.lookup.set(scope, result)?;
    Ok(())
}

fn push_eval(scope: &mut Scope, src: &Lookup, dst: &Lookup) -> RunResult<()> {
    let dst_var = scope.lookup(&dst.name)?;
    let src_var = scope.lookup(&src.name)?;
    if !dst_var.is_array {
        return Err(scope
            .error(
                ErrorKind::TypeError,
                format!("Pushing onto \"{}\" which is a number, not an array", dst.name),
            )
            .into());
    }
    if src_var.is_borrowed {
        return Err(scope
            .error(
                ErrorKind::ReferenceOwnership,
                format!("Pushing borrowed reference \"{}\"", src.name),
            )
            .into());
    }
    let indices = dst.indices(scope)?;
    let owned = scope.remove(&src.name)?;
    let cell = owned.into_cell();

    let mut memory = dst_var.write();
    let mut level: &mut Vec<MemoryCell> = &mut memory;
    for index in &indices {
        let slot = lookup_slot(scope, dst, &indices, level.len(), index)?;
        match &mut level[slot] {
            MemoryCell::Array(inner) => level = inner,
            MemoryCell::Num(_) => {
                return Err(scope
                    .error(
                        ErrorKind::TypeError,
                        format!(
                            "Pushing onto a location in \"{}\" which is a number, not an array",
                            dst.name
                        ),
                    )
                    .into());
            }
        }
    }
    level.push(cell);
    Ok(())
}

fn pop_eval(scope: &mut Scope, src: &Lookup, dst: &Lookup) -> RunResult<()> {
    let src_var = scope.lookup(&src.name)?;
    if !src_var.is_array {
        return Err(scope
            .error(
                ErrorKind::TypeError,
                format!("Popping from \"{}\" which is a number, not an array", src.name),
            )
            .into());
    }
    let indices = src.indices(scope)?;
    let cell = {
        let mut memory = src_var.write();
        let mut level: &mut Vec<MemoryCell> = &mut memory;
        for index in &indices {
            let slot = lookup_slot(scope, src, &indices, level.len(), index)?;
            match &mut level[slot] {
                MemoryCell::Array(inner) => level = inner,
                MemoryCell::Num(_) => {
                    return Err(scope
                        .error(
                            ErrorKind::TypeError,
                            format!(
                                "Popping from a location in \"{}\" which is a number, not an array",
                                src.name
                            ),
                        )
                        .into());
                }
            }
        }
        level.pop().ok_or_else(|| {
            scope.error(
                ErrorKind::IndexError,
                format!(
                    "Popping from empty array \"{}\" (or an element therein)",
                    src.name
                ),
            )
        })?
    };
    scope.assign(&dst.name, Variable::from_cell(cell, dst.mono_name))?;
    Ok(())
}

fn lookup_slot(
    scope: &Scope,
    lookup: &Lookup,
    indices: &SmallVec<[BigInt; 4]>,
    len: usize,
    index: &BigInt,
) -> RunResult<usize> {
    use num_traits::ToPrimitive;
    let len_int = BigInt::from(len);
    let shifted = if index.is_negative() { index + &len_int } else { index.clone() };
    if shifted.is_negative() || shifted >= len_int {
        let rendered: Vec<String> = indices.iter().map(ToString::to_string).collect();
        return Err(scope
            .error(
                ErrorKind::IndexError,
                format!(
                    "Out of bounds error accessing \"{}[{}]\"",
                    lookup.name,
                    rendered.join("][")
                ),
            )
            .into());
    }
    shifted
        .to_usize()
        .ok_or_else(|| scope.error(ErrorKind::IndexError, "Index is too large").into())
}

fn swap_eval(stmt: &SwapStmt, scope: &mut Scope) -> RunResult<()> {
    let lhs_var = scope.lookup(&stmt.lhs.name)?;
    let rhs_var = scope.lookup(&stmt.rhs.name)?;

    let lhs_path = swap_path(scope, &stmt.lhs, stmt.lhs_tail.as_ref())?;
    let rhs_path = swap_path(scope, &stmt.rhs, stmt.rhs_tail.as_ref())?;

    let (lhs_shape, rhs_shape) = if lhs_var.shares_memory_with(&rhs_var) {
        let mut memory = lhs_var.write();
        let cell_a = take_at(scope, &stmt.lhs, &mut memory, lhs_var.is_array, &lhs_path)?;
        let cell_b = take_at(scope, &stmt.rhs, &mut memory, rhs_var.is_array, &rhs_path)?;
        let lhs_shape = set_at(&mut memory, &lhs_path, cell_b);
        let rhs_shape = set_at(&mut memory, &rhs_path, cell_a);
        (lhs_shape, rhs_shape)
    } else {
        // Lock both sides in a stable order so two threads swapping the
        // same pair of shared arrays cannot deadlock.
        let lhs_first = lhs_var.memory_token() <= rhs_var.memory_token();
        let (mut first, mut second) = if lhs_first {
            (lhs_var.write(), rhs_var.write())
        } else {
            (rhs_var.write(), lhs_var.write())
        };
        let (lhs_memory, rhs_memory) = if lhs_first {
            (&mut *first, &mut *second)
        } else {
            (&mut *second, &mut *first)
        };
        let cell_a = take_at(scope, &stmt.lhs, lhs_memory, lhs_var.is_array, &lhs_path)?;
        let cell_b = take_at(scope, &stmt.rhs, rhs_memory, rhs_var.is_array, &rhs_path)?;
        let lhs_shape = set_at(lhs_memory, &lhs_path, cell_b);
        let rhs_shape = set_at(rhs_memory, &rhs_path, cell_a);
        (lhs_shape, rhs_shape)
    };

    // Whole-variable swaps can change a binding between scalar and
    // array; the root flags must follow.
    if lhs_path.is_empty() {
        scope.set_is_array(&stmt.lhs.name, lhs_shape);
    }
    if rhs_path.is_empty() {
        scope.set_is_array(&stmt.rhs.name, rhs_shape);
    }
    Ok(())
}

/// Evaluates a swap side's full index path. Swap locations are
/// bounds-checked strictly: negative indices are out of bounds here.
fn swap_path(scope: &Scope, lookup: &Lookup, tail: Option<&Expr>) -> RunResult<Vec<BigInt>> {
    let mut path: Vec<BigInt> = lookup.indices(scope)?.into_vec();
    if let Some(tail) = tail {
        path.push(tail.eval_number(scope, "swap")?.truncate());
    }
    for index in &path {
        if index.is_negative() {
            return Err(scope
                .error(
                    ErrorKind::IndexError,
                    format!("Negative index in swap of \"{}\"", lookup.name),
                )
                .into());
        }
    }
    Ok(path)
}

/// Removes and returns the cell at `path`, leaving a placeholder. An
/// empty path addresses the variable's whole value.
fn take_at(
    scope: &Scope,
    lookup: &Lookup,
    memory: &mut Vec<MemoryCell>,
    is_array: bool,
    path: &[BigInt],
) -> RunResult<MemoryCell> {
    use num_traits::ToPrimitive;
    if path.is_empty() {
        if is_array {
            return Ok(MemoryCell::Array(std::mem::take(memory)));
        }
        return Ok(std::mem::replace(
            &mut memory[0],
            MemoryCell::Num(Number::zero()),
        ));
    }
    if !is_array {
        return Err(scope
            .error(
                ErrorKind::IndexError,
                format!("Indexing into \"{}\" which is a number", lookup.name),
            )
            .into());
    }
    let mut level: &mut Vec<MemoryCell> = memory;
    for (depth, index) in path.iter().enumerate() {
        let slot = index
            .to_usize()
            .filter(|slot| *slot < level.len())
            .ok_or_else(|| {
                scope.error(
                    ErrorKind::IndexError,
                    format!("Out of bounds error in swap of \"{}\"", lookup.name),
                )
            })?;
        if depth + 1 == path.len() {
            return Ok(std::mem::replace(
                &mut level[slot],
                MemoryCell::Num(Number::zero()),
            ));
        }
        match &mut level[slot] {
            MemoryCell::Array(inner) => level = inner,
            MemoryCell::Num(_) => {
                return Err(scope
                    .error(
                        ErrorKind::IndexError,
                        format!("Indexing into a number in swap of \"{}\"", lookup.name),
                    )
                    .into());
            }
        }
    }
    unreachable!("loop returns on the final index")
}

/// Writes a cell back to `path`, returning whether the addressed root
/// is now an array. `path` was validated by the paired [`take_at`].
fn set_at(memory: &mut Vec<MemoryCell>, path: &[BigInt], cell: MemoryCell) -> bool {
    use num_traits::ToPrimitive;
    if path.is_empty() {
        return match cell {
            MemoryCell::Array(cells) => {
                *memory = cells;
                true
            }
            MemoryCell::Num(value) => {
                *memory = vec![MemoryCell::Num(value)];
                false
            }
        };
    }
    let mut level: &mut Vec<MemoryCell> = memory;
    for (depth, index) in path.iter().enumerate() {
        let Some(slot) = index.to_usize().filter(|slot| *slot < level.len()) else {
            return true;
        };
        if depth + 1 == path.len() {
            level[slot] = cell;
            return true;
        }
        match &mut level[slot] {
            MemoryCell::Array(inner) => level = inner,
            MemoryCell::Num(_) => return true,
        }
    }
    true
}

fn promote_eval(stmt: &PromoteStmt, scope: &mut Scope, backwards: bool) -> RunResult<()> {
    if backwards {
        let var = scope.remove(&stmt.dst)?;
        if var.is_borrowed {
            return Err(scope
                .error(
                    ErrorKind::ReferenceOwnership,
                    format!("Demoting borrowed reference \"{}\"", stmt.dst),
                )
                .into());
        }
        scope.assign(&stmt.src, var.with_mono(true))?;
    } else {
        let var = scope.remove(&stmt.src)?;
        if var.is_borrowed {
            return Err(scope
                .error(
                    ErrorKind::ReferenceOwnership,
                    format!("Promoting borrowed reference \"{}\"", stmt.src),
                )
                .into());
        }
        scope.assign(&stmt.dst, var.with_mono(false))?;
    }
    Ok(())
}

fn if_eval(stmt: &IfStmt, scope: &mut Scope, backwards: bool) -> RunResult<bool> {
    let (enter_expr, exit_expr) = if backwards {
        (&stmt.exit, &stmt.enter)
    } else {
        (&stmt.enter, &stmt.exit)
    };
    let enter_result = enter_expr.eval_number(scope, "if")?.truthy();
    let branch = if enter_result { &stmt.lines } else { &stmt.else_lines };
    run_lines_fixed(branch, scope, backwards, "if")?;
    if !stmt.is_mono {
        let exit_result = exit_expr.eval_number(scope, "fi")?.truthy();
        if exit_result != enter_result {
            return Err(scope
                .error(
                    ErrorKind::FailedAssertion,
                    "Failed exit assertion in if-fi statement",
                )
                .into());
        }
    }
    Ok(backwards)
}

fn loop_eval(stmt: &LoopStmt, scope: &mut Scope, backwards: bool) -> RunResult<bool> {
    if stmt.is_mono {
        // Mono loops only run forwards and carry no assertions.
        while stmt.forward.eval_number(scope, "loop")?.truthy() {
            run_lines_fixed(&stmt.lines, scope, false, "loop")?;
        }
        return Ok(backwards);
    }
    let (condition, assertion) = if backwards {
        (&stmt.backward, &stmt.forward)
    } else {
        (&stmt.forward, &stmt.backward)
    };
    if assertion.eval_number(scope, "pool")?.truthy() {
        return Err(scope
            .error(
                ErrorKind::FailedAssertion,
                "Loop reverse condition is true before loop start",
            )
            .into());
    }
    while condition.eval_number(scope, "loop")?.truthy() {
        run_lines_fixed(&stmt.lines, scope, backwards, "loop")?;
        if !assertion.eval_number(scope, "pool")?.truthy() {
            return Err(scope
                .error(
                    ErrorKind::FailedAssertion,
                    "Forward loop condition holds when reverse condition does not",
                )
                .into());
        }
    }
    Ok(backwards)
}

fn for_eval(stmt: &ForStmt, scope: &mut Scope, backwards: bool) -> RunResult<bool> {
    let iter = IterSource::new(&stmt.iterator, scope)?;
    let count = iter.len();
    for step in 0..count {
        let position = if backwards { count - 1 - step } else { step };
        let element = iter.get(position);
        let binding = Variable::from_cell(element.clone(), stmt.mono_name).borrowed();
        scope.assign(&stmt.name, binding)?;
        run_lines_fixed(&stmt.lines, scope, backwards, "for")?;
        // Round-trip check: the body must leave the loop variable equal
        // to its iterator element, or reversal could not rederive it.
        let current = scope.lookup_frame(&stmt.name)?.value_cell();
        if current != element {
            return Err(scope
                .error(
                    ErrorKind::FailedAssertion,
                    format!(
                        "For-loop variable \"{}\" does not match its iterator element at the end of an iteration",
                        stmt.name
                    ),
                )
                .into());
        }
        scope.remove(&stmt.name)?;
    }
    Ok(backwards)
}

/// Runs a try body forwards, watching for `catch`. A fired catch rolls
/// the partial attempt back (lines before the catch run in reverse) and
/// reports `Caught` to the enclosing try.
fn run_try_body(lines: &[Line], scope: &mut Scope) -> RunResult<()> {
    for stop in 0..lines.len() {
        match lines[stop].eval(scope, false) {
            Ok(dir) => {
                if dir {
                    return Err(scope
                        .error(
                            ErrorKind::DirectionChange,
                            "Direction of time changed inside a try body",
                        )
                        .into());
                }
            }
            Err(RunError::Caught) => {
                for line in lines[..stop].iter().rev() {
                    line.eval(scope, true)?;
                }
                return Err(RunError::Caught);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn try_eval(stmt: &TryStmt, scope: &mut Scope, backwards: bool) -> RunResult<bool> {
    let iter = IterSource::new(&stmt.iterator, scope)?;
    if backwards {
        return try_reverse_eval(stmt, scope, &iter);
    }
    for position in 0..iter.len() {
        let element = iter.get(position);
        scope.assign(&stmt.name, Variable::from_cell(element, stmt.mono_name))?;
        match run_try_body(&stmt.lines, scope) {
            // The attempt ran to the end uncaught: this element is the
            // try's result and stays bound.
            Ok(()) => return Ok(backwards),
            Err(RunError::Caught) => {
                scope.remove(&stmt.name)?;
            }
            Err(err) => return Err(err),
        }
    }
    Err(scope
        .error(
            ErrorKind::ExhaustedTry,
            "Try statement exhausted its iterator without accepting an element",
        )
        .into())
}

/// Reverses a successful try. The recorded exit value is whatever the
/// loop variable holds now. The iterator is replayed forwards: every
/// element before the first uncaught one must still be rejected, and
/// the first uncaught element must equal the recorded value. The
/// accepted attempt is then unwound by running the body backwards
/// twice, cancelling the replay and the original forward pass.
fn try_reverse_eval(stmt: &TryStmt, scope: &mut Scope, iter: &IterSource) -> RunResult<bool> {
    let recorded = scope.lookup_frame(&stmt.name)?.value_cell();
    scope.remove(&stmt.name)?;
    for position in 0..iter.len() {
        let element = iter.get(position);
        let accepted = element == recorded;
        scope.assign(&stmt.name, Variable::from_cell(element, stmt.mono_name))?;
        match run_try_body(&stmt.lines, scope) {
            Ok(()) if accepted => {
                run_lines_fixed(&stmt.lines, scope, true, "try")?;
                run_lines_fixed(&stmt.lines, scope, true, "try")?;
                scope.remove(&stmt.name)?;
                return Ok(true);
            }
            Ok(()) => {
                return Err(scope
                    .error(
                        ErrorKind::TryReverseError,
                        "An element rejected by the forward try passes during reversal",
                    )
                    .into());
            }
            Err(RunError::Caught) if accepted => {
                return Err(scope
                    .error(
                        ErrorKind::TryReverseError,
                        "The recorded exit value of a try no longer passes its body",
                    )
                    .into());
            }
            Err(RunError::Caught) => {
                scope.remove(&stmt.name)?;
            }
            Err(err) => return Err(err),
        }
    }
    Err(scope
        .error(
            ErrorKind::ExhaustedTry,
            "Reversed try never reached its recorded exit value",
        )
        .into())
}

fn do_undo_eval(stmt: &DoUndoStmt, scope: &mut Scope, backwards: bool) -> RunResult<bool> {
    // The do block always runs forwards first. If it flips, the runner
    // walks back out, undoing the partial work; the whole sandwich then
    // reports an early reversal.
    let after_do = run_lines(&stmt.do_lines, scope, false)?;
    if after_do {
        return Ok(true);
    }
    // Under reverse execution the arrow flips between do and yield.
    if backwards {
        mono_guard(scope, "at the end of a do block")?;
    }
    let after_yield = run_lines(&stmt.yield_lines, scope, backwards)?;
    // Under forward execution the arrow flips between yield and undo.
    if !after_yield {
        mono_guard(scope, "using an undo block")?;
    }
    run_lines(&stmt.do_lines, scope, true)?;
    Ok(after_yield)
}

fn print_eval(stmt: &PrintStmt, scope: &mut Scope) -> RunResult<()> {
    let mut rendered = Vec::with_capacity(stmt.items.len());
    for item in &stmt.items {
        match item {
            PrintItem::Text(text) => rendered.push(text.clone()),
            PrintItem::Value(expr) => rendered.push(expr.eval(scope)?.to_string()),
        }
    }
    let writer = scope.writer.clone();
    let mut writer = writer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    for (position, text) in rendered.iter().enumerate() {
        if position > 0 {
            writer.push(' ');
        }
        writer.write(text);
    }
    if stmt.newline {
        writer.push('\n');
    }
    Ok(())
}

fn sympathetic(scope: &Scope) -> RunError {
    scope
        .error(
            ErrorKind::Sympathetic,
            "Aborted after a failure in a peer thread",
        )
        .into()
}

fn barrier_eval(name: &str, scope: &mut Scope) -> RunResult<()> {
    let Some(ctx) = scope.threads.clone() else {
        // Outside a parallel call a rendezvous of one is immediate.
        return Ok(());
    };
    if ctx.manager.panicked() {
        return Err(sympathetic(scope));
    }
    match ctx.manager.barrier(name).wait() {
        Ok(()) => Ok(()),
        Err(_) => Err(sympathetic(scope)),
    }
}

fn mutex_eval(stmt: &MutexStmt, scope: &mut Scope, backwards: bool) -> RunResult<bool> {
    let Some(ctx) = scope.threads.clone() else {
        // A single flow of control cannot contend; just run the body.
        return run_lines(&stmt.lines, scope, backwards);
    };
    if ctx.manager.panicked() {
        return Err(sympathetic(scope));
    }
    let mutex = ctx.manager.mutex(&stmt.name);
    match mutex.enter(ctx.thread_id, backwards) {
        Ok(()) => {}
        Err(CoordinationError::CounterFlow) => {
            return Err(scope
                .error(
                    ErrorKind::MutexError,
                    format!(
                        "Entering mutex \"{}\" against the direction of its holders",
                        stmt.name
                    ),
                )
                .into());
        }
        Err(CoordinationError::Aborted) => return Err(sympathetic(scope)),
    }
    let result = run_lines(&stmt.lines, scope, backwards);
    mutex.exit(ctx.thread_id, backwards);
    result
}
