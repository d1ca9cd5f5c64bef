//! Lowering from the surface tree to the runtime tree.
//!
//! This pass propagates the mono flag bottom-up through expressions,
//! derives each statement's `is_mono`/`mod_reverse` marks, folds
//! constant arithmetic, and rejects the statically illegal programs:
//! mono information flowing into non-mono destinations, self-modifying
//! index expressions, non-invertible modification of reversible state,
//! and `catch` outside a `try` body.

use std::fmt;

use strum::IntoStaticStr;

use crate::{
    expressions::{Expr, Lookup},
    function::{CallBlock, CallStmt, Function, Param},
    parse::{
        AstCallBlock, AstExpr, AstFunction, AstLookup, AstPrintItem, AstStatement,
        AstStatementKind,
    },
    statements::{
        BindingStmt, DoUndoStmt, ForStmt, IfStmt, Line, LoopStmt, ModopStmt, MutexStmt, PrintItem,
        PrintStmt, PromoteStmt, Statement, SwapStmt, TransferStmt, TryStmt,
    },
    value::Number,
};

/// Statically detectable illegality classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum SyntaxErrorKind {
    IllegalMono,
    ExpectedMono,
    SelfModification,
    NoninvertibleModification,
    TypeError,
    CircularDefinition,
    DuplicateDefinition,
    NameConflict,
    MisplacedCatch,
    MissingReverseCondition,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = (*self).into();
        f.write_str(name)
    }
}

/// A rejection from the lowering pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub line: u32,
    pub kind: SyntaxErrorKind,
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(line: u32, kind: SyntaxErrorKind, message: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Syntax error of type {} at line {}: {}",
            self.kind, self.line, self.message
        )
    }
}

impl std::error::Error for CompileError {}

type CompileResult<T> = Result<T, CompileError>;

/// A compiled global-init declaration (`global name [= expr]`).
#[derive(Debug)]
pub(crate) struct GlobalDecl {
    pub name: String,
    pub is_mono: bool,
    pub rhs: Option<Expr>,
}

fn is_mono_name(name: &str) -> bool {
    name.starts_with('.')
}

/// An expression lowered together with its propagated mono flag.
struct CompiledExpr {
    expr: Expr,
    has_mono: bool,
}

fn compile_expr(ast: &AstExpr, line: u32) -> CompileResult<CompiledExpr> {
    Ok(match ast {
        AstExpr::Number(value) => CompiledExpr {
            expr: Expr::Const(value.clone()),
            has_mono: false,
        },
        AstExpr::Lookup(lookup) => {
            let (lookup, has_mono) = compile_lookup(lookup, line)?;
            CompiledExpr {
                expr: Expr::Lookup(lookup),
                has_mono,
            }
        }
        AstExpr::Length(lookup) => {
            let (lookup, has_mono) = compile_lookup(lookup, line)?;
            CompiledExpr {
                expr: Expr::Length(lookup),
                has_mono,
            }
        }
        AstExpr::Binop { lhs, op, rhs } => {
            let lhs = compile_expr(lhs, line)?;
            let rhs = compile_expr(rhs, line)?;
            let has_mono = lhs.has_mono || rhs.has_mono;
            // Constant computation folds at compile time when it cannot
            // fail; failing operands are left for the runtime so the
            // error carries a call stack.
            if let (Expr::Const(a), Expr::Const(b)) = (&lhs.expr, &rhs.expr) {
                if let Ok(value) = op.apply(a, b) {
                    return Ok(CompiledExpr {
                        expr: Expr::Const(value),
                        has_mono,
                    });
                }
            }
            CompiledExpr {
                expr: Expr::Binop {
                    lhs: Box::new(lhs.expr),
                    op: *op,
                    rhs: Box::new(rhs.expr),
                },
                has_mono,
            }
        }
        AstExpr::Uniop { op, expr } => {
            let inner = compile_expr(expr, line)?;
            if let Expr::Const(value) = &inner.expr {
                return Ok(CompiledExpr {
                    expr: Expr::Const(op.apply(value)),
                    has_mono: inner.has_mono,
                });
            }
            CompiledExpr {
                expr: Expr::Uniop {
                    op: *op,
                    expr: Box::new(inner.expr),
                },
                has_mono: inner.has_mono,
            }
        }
        AstExpr::ArrayLiteral(items) => {
            let mut has_mono = false;
            let mut compiled = Vec::with_capacity(items.len());
            for item in items {
                let item = compile_expr(item, line)?;
                has_mono |= item.has_mono;
                compiled.push(item.expr);
            }
            CompiledExpr {
                expr: Expr::ArrayLiteral(compiled),
                has_mono,
            }
        }
        AstExpr::ArrayRange { start, stop, step } => {
            let start = compile_expr(start, line)?;
            let stop = compile_expr(stop, line)?;
            let step = match step {
                Some(step) => compile_expr(step, line)?,
                None => CompiledExpr {
                    expr: Expr::Const(Number::one()),
                    has_mono: false,
                },
            };
            CompiledExpr {
                has_mono: start.has_mono || stop.has_mono || step.has_mono,
                expr: Expr::ArrayRange {
                    start: Box::new(start.expr),
                    stop: Box::new(stop.expr),
                    step: Box::new(step.expr),
                },
            }
        }
        AstExpr::ArrayTensor { fill, dims } => {
            let fill = compile_expr(fill, line)?;
            let dims = compile_expr(dims, line)?;
            CompiledExpr {
                has_mono: fill.has_mono || dims.has_mono,
                expr: Expr::ArrayTensor {
                    fill: Box::new(fill.expr),
                    dims: Box::new(dims.expr),
                },
            }
        }
        AstExpr::ThreadId => CompiledExpr {
            expr: Expr::ThreadId,
            has_mono: false,
        },
        AstExpr::NumThreads => CompiledExpr {
            expr: Expr::NumThreads,
            has_mono: false,
        },
    })
}

fn compile_lookup(ast: &AstLookup, line: u32) -> CompileResult<(Lookup, bool)> {
    let mono_name = is_mono_name(&ast.name);
    let mut has_mono = mono_name;
    let mut index = Vec::with_capacity(ast.index.len());
    for idx in &ast.index {
        let idx = compile_expr(idx, line)?;
        if expr_uses_var(&idx.expr, &ast.name) {
            return Err(CompileError::new(
                line,
                SyntaxErrorKind::SelfModification,
                format!("Using \"{}\" to index itself", ast.name),
            ));
        }
        has_mono |= idx.has_mono;
        index.push(idx.expr);
    }
    Ok((
        Lookup {
            name: ast.name.clone(),
            index,
            mono_name,
        },
        has_mono,
    ))
}

fn expr_uses_var(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Const(_) | Expr::ThreadId | Expr::NumThreads => false,
        Expr::Lookup(lookup) | Expr::Length(lookup) => lookup_uses_var(lookup, name),
        Expr::Binop { lhs, rhs, .. } => expr_uses_var(lhs, name) || expr_uses_var(rhs, name),
        Expr::Uniop { expr, .. } => expr_uses_var(expr, name),
        Expr::ArrayLiteral(items) => items.iter().any(|item| expr_uses_var(item, name)),
        Expr::ArrayRange { start, stop, step } => {
            expr_uses_var(start, name) || expr_uses_var(stop, name) || expr_uses_var(step, name)
        }
        Expr::ArrayTensor { fill, dims } => {
            expr_uses_var(fill, name) || expr_uses_var(dims, name)
        }
    }
}

fn lookup_uses_var(lookup: &Lookup, name: &str) -> bool {
    lookup.name == name || lookup.index.iter().any(|idx| expr_uses_var(idx, name))
}

fn any_mod_reverse(lines: &[Line]) -> bool {
    lines.iter().any(|line| line.mod_reverse)
}

fn compile_body(lines: &[AstStatement], in_try: bool) -> CompileResult<Vec<Line>> {
    lines
        .iter()
        .map(|stmt| compile_statement(stmt, in_try))
        .collect()
}

fn compile_binding(
    line: u32,
    name: &str,
    rhs: Option<&AstExpr>,
    verb: &str,
) -> CompileResult<(BindingStmt, bool, bool)> {
    let mono_name = is_mono_name(name);
    let rhs = match rhs {
        Some(rhs) => compile_expr(rhs, line)?,
        None => CompiledExpr {
            expr: Expr::Const(Number::zero()),
            has_mono: false,
        },
    };
    if rhs.has_mono && !mono_name {
        return Err(CompileError::new(
            line,
            SyntaxErrorKind::IllegalMono,
            format!("{verb} non-mono \"{name}\" using mono information"),
        ));
    }
    if expr_uses_var(&rhs.expr, name) {
        return Err(CompileError::new(
            line,
            SyntaxErrorKind::CircularDefinition,
            format!("Variable \"{name}\" is used during its own {verb}"),
        ));
    }
    let is_mono = mono_name || rhs.has_mono;
    let stmt = BindingStmt {
        name: name.to_owned(),
        mono_name,
        rhs: rhs.expr,
    };
    Ok((stmt, is_mono, !mono_name))
}

pub(crate) fn compile_statement(ast: &AstStatement, in_try: bool) -> CompileResult<Line> {
    let line = ast.line;
    let (stmt, is_mono, mod_reverse) = match &ast.kind {
        AstStatementKind::Let { name, rhs } => {
            let (stmt, is_mono, mod_reverse) = compile_binding(line, name, rhs.as_ref(), "Letting")?;
            (Statement::Let(stmt), is_mono, mod_reverse)
        }
        AstStatementKind::Unlet { name, rhs } => {
            let (stmt, is_mono, mod_reverse) =
                compile_binding(line, name, rhs.as_ref(), "Unletting")?;
            (Statement::Unlet(stmt), is_mono, mod_reverse)
        }
        AstStatementKind::Promote { src, dst } => {
            if !is_mono_name(src) {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::ExpectedMono,
                    format!("Promoting non-mono variable \"{src}\""),
                ));
            }
            if is_mono_name(dst) {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    format!("Promoting to mono variable \"{dst}\""),
                ));
            }
            (
                Statement::Promote(PromoteStmt {
                    src: src.clone(),
                    dst: dst.clone(),
                }),
                false,
                true,
            )
        }
        AstStatementKind::Swap { lhs, rhs } => {
            let (mut lhs, lhs_mono) = compile_lookup(lhs, line)?;
            let (mut rhs, rhs_mono) = compile_lookup(rhs, line)?;
            let is_mono = lhs_mono || rhs_mono;
            let mod_reverse = !(lhs.mono_name && rhs.mono_name);
            if is_mono && mod_reverse {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    format!("Using mono information to swap non-mono \"{}\" <=> \"{}\"", lhs.name, rhs.name),
                ));
            }
            if lhs.index.iter().any(|idx| expr_uses_var(idx, &rhs.name))
                || rhs.index.iter().any(|idx| expr_uses_var(idx, &lhs.name))
            {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::SelfModification,
                    format!(
                        "Swap uses information from one side as an index on the other \"{}\" <=> \"{}\"",
                        lhs.name, rhs.name
                    ),
                ));
            }
            let lhs_tail = lhs.index.pop();
            let rhs_tail = rhs.index.pop();
            (
                Statement::Swap(SwapStmt {
                    lhs,
                    rhs,
                    lhs_tail,
                    rhs_tail,
                }),
                is_mono,
                mod_reverse,
            )
        }
        AstStatementKind::Push { src, dst } => {
            let (src, src_mono) = compile_lookup(src, line)?;
            let (dst, dst_mono) = compile_lookup(dst, line)?;
            let is_mono = src_mono || dst_mono;
            let mod_reverse = !src.mono_name || !dst.mono_name;
            if !src.index.is_empty() {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::TypeError,
                    format!("Pushing an element of array \"{}\" would cause aliasing", src.name),
                ));
            }
            if !dst.mono_name
                && (src.name == dst.name || dst.index.iter().any(|idx| expr_uses_var(idx, &dst.name)))
            {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::SelfModification,
                    format!("Push statement modifies variable \"{}\" using itself", dst.name),
                ));
            }
            if !src.mono_name && dst.index.iter().any(|idx| expr_uses_var(idx, &src.name)) {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::SelfModification,
                    format!(
                        "Push source variable \"{}\" is used in the destination",
                        src.name
                    ),
                ));
            }
            if is_mono && (!dst.mono_name || !src.mono_name) {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    format!("Pushing non-mono \"{}\" using mono information", src.name),
                ));
            }
            (
                Statement::Push(TransferStmt { src, dst }),
                is_mono,
                mod_reverse,
            )
        }
        AstStatementKind::Pop { src, dst } => {
            let (src, src_mono) = compile_lookup(src, line)?;
            let (dst, dst_mono) = compile_lookup(dst, line)?;
            let is_mono = src_mono || dst_mono;
            let mod_reverse = !src.mono_name || !dst.mono_name;
            if !dst.index.is_empty() {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::TypeError,
                    format!("Pop destination \"{}\" should be a name, not an element", dst.name),
                ));
            }
            if is_mono && (!dst.mono_name || !src.mono_name) {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    format!("Pop modifies non-mono \"{}\" using mono information", src.name),
                ));
            }
            (
                Statement::Pop(TransferStmt { src, dst }),
                is_mono,
                mod_reverse,
            )
        }
        AstStatementKind::Modop { lookup, op, expr } => {
            let (lookup, lookup_mono) = compile_lookup(lookup, line)?;
            let expr = compile_expr(expr, line)?;
            let is_mono = lookup_mono || expr.has_mono;
            if is_mono && !lookup.mono_name {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    format!("Modifying non-mono \"{}\" using mono information", lookup.name),
                ));
            }
            if !is_mono && !op.invertible() {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::NoninvertibleModification,
                    format!(
                        "Operator \"{}\" is not invertible and so may only modify mono variables",
                        op.symbol()
                    ),
                ));
            }
            if expr_uses_var(&expr.expr, &lookup.name) {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::SelfModification,
                    format!("Variable \"{}\" is used in its own modification", lookup.name),
                ));
            }
            (
                Statement::Modop(ModopStmt {
                    lookup,
                    op: *op,
                    expr: expr.expr,
                }),
                is_mono,
                !is_mono,
            )
        }
        AstStatementKind::If {
            enter,
            lines,
            else_lines,
            exit,
        } => {
            let enter = compile_expr(enter, line)?;
            let lines = compile_body(lines, false)?;
            let else_lines = compile_body(else_lines, false)?;
            let is_mono = enter.has_mono;
            let exit = match exit {
                Some(exit) => {
                    let exit = compile_expr(exit, line)?;
                    if exit.has_mono && !is_mono {
                        return Err(CompileError::new(
                            line,
                            SyntaxErrorKind::IllegalMono,
                            "Exit condition of a non-mono if uses mono information",
                        ));
                    }
                    exit.expr
                }
                None => enter.expr.clone(),
            };
            let mod_reverse = any_mod_reverse(&lines) || any_mod_reverse(&else_lines);
            if is_mono && mod_reverse {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    "Branching on mono information to modify non-mono variables",
                ));
            }
            (
                Statement::If(IfStmt {
                    enter: enter.expr,
                    lines,
                    else_lines,
                    exit,
                    is_mono,
                }),
                is_mono,
                mod_reverse,
            )
        }
        AstStatementKind::Loop {
            forward,
            lines,
            backward,
        } => {
            let forward = compile_expr(forward, line)?;
            let lines = compile_body(lines, false)?;
            let is_mono = forward.has_mono;
            let backward = match backward {
                Some(backward) => {
                    let backward = compile_expr(backward, line)?;
                    if is_mono {
                        return Err(CompileError::new(
                            line,
                            SyntaxErrorKind::IllegalMono,
                            "A mono loop must not carry a reverse condition",
                        ));
                    }
                    if backward.has_mono {
                        return Err(CompileError::new(
                            line,
                            SyntaxErrorKind::IllegalMono,
                            "Reverse condition of a loop uses mono information",
                        ));
                    }
                    backward.expr
                }
                None => {
                    if !is_mono {
                        return Err(CompileError::new(
                            line,
                            SyntaxErrorKind::MissingReverseCondition,
                            "A non-mono loop needs a reverse condition in its pool clause",
                        ));
                    }
                    forward.expr.clone()
                }
            };
            let mod_reverse = any_mod_reverse(&lines);
            if is_mono && mod_reverse {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    "Looping on mono information to modify non-mono variables",
                ));
            }
            (
                Statement::Loop(LoopStmt {
                    forward: forward.expr,
                    lines,
                    backward,
                    is_mono,
                }),
                is_mono,
                mod_reverse,
            )
        }
        AstStatementKind::For {
            name,
            iterator,
            lines,
        } => {
            let mono_name = is_mono_name(name);
            let iterator = compile_expr(iterator, line)?;
            let is_mono = mono_name || iterator.has_mono;
            if is_mono && !mono_name {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    format!("Binding non-mono loop variable \"{name}\" using mono information"),
                ));
            }
            let lines = compile_body(lines, false)?;
            let mod_reverse = any_mod_reverse(&lines);
            if is_mono && mod_reverse {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    "Iterating on mono information to modify non-mono variables",
                ));
            }
            (
                Statement::For(ForStmt {
                    name: name.clone(),
                    mono_name,
                    iterator: iterator.expr,
                    lines,
                }),
                is_mono,
                mod_reverse,
            )
        }
        AstStatementKind::Try {
            name,
            iterator,
            lines,
        } => {
            let mono_name = is_mono_name(name);
            let iterator = compile_expr(iterator, line)?;
            let is_mono = mono_name || iterator.has_mono;
            if is_mono && !mono_name {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    format!("Try binds non-mono \"{name}\" using mono information"),
                ));
            }
            let lines = compile_body(lines, true)?;
            let mod_reverse = !mono_name || any_mod_reverse(&lines);
            if is_mono && any_mod_reverse(&lines) {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    "A mono try must not modify non-mono variables",
                ));
            }
            (
                Statement::Try(TryStmt {
                    name: name.clone(),
                    mono_name,
                    iterator: iterator.expr,
                    lines,
                }),
                is_mono,
                mod_reverse,
            )
        }
        AstStatementKind::Catch(expr) => {
            if !in_try {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::MisplacedCatch,
                    "catch is only allowed directly inside a try body",
                ));
            }
            let expr = compile_expr(expr, line)?;
            (Statement::Catch(expr.expr), false, false)
        }
        AstStatementKind::DoUndo {
            do_lines,
            yield_lines,
        } => {
            let do_lines = compile_body(do_lines, false)?;
            let yield_lines = compile_body(yield_lines, false)?;
            let mod_reverse = any_mod_reverse(&do_lines) || any_mod_reverse(&yield_lines);
            (
                Statement::DoUndo(DoUndoStmt {
                    do_lines,
                    yield_lines,
                }),
                false,
                mod_reverse,
            )
        }
        AstStatementKind::Print { items, newline } => {
            let mut is_mono = false;
            let mut compiled = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    AstPrintItem::Text(text) => compiled.push(PrintItem::Text(text.clone())),
                    AstPrintItem::Value(expr) => {
                        let expr = compile_expr(expr, line)?;
                        is_mono |= expr.has_mono;
                        compiled.push(PrintItem::Value(expr.expr));
                    }
                }
            }
            (
                Statement::Print(PrintStmt {
                    items: compiled,
                    newline: *newline,
                }),
                is_mono,
                false,
            )
        }
        AstStatementKind::Barrier(name) => (Statement::Barrier(name.clone()), false, true),
        AstStatementKind::Mutex { name, lines } => {
            let lines = compile_body(lines, false)?;
            let mod_reverse = any_mod_reverse(&lines);
            (
                Statement::Mutex(MutexStmt {
                    name: name.clone(),
                    lines,
                }),
                false,
                mod_reverse,
            )
        }
        AstStatementKind::Call {
            in_params,
            blocks,
            out_params,
        } => {
            let call = compile_call(line, in_params, blocks, out_params)?;
            let is_mono = call_is_mono(line, &call)?;
            (Statement::Call(call), is_mono, !is_mono)
        }
    };
    Ok(Line {
        stmt,
        is_mono,
        mod_reverse,
    })
}

fn compile_call(
    line: u32,
    in_params: &[String],
    blocks: &[AstCallBlock],
    out_params: &[String],
) -> CompileResult<CallStmt> {
    let mut compiled_blocks = Vec::with_capacity(blocks.len());
    for block in blocks {
        let num_threads = match &block.num_threads {
            Some(expr) => Some(compile_expr(expr, line)?.expr),
            None => None,
        };
        compiled_blocks.push(CallBlock {
            uncall: block.uncall,
            name: block.name.clone(),
            num_threads,
            borrowed: block.borrowed.iter().map(Param::new).collect(),
        });
    }
    Ok(CallStmt {
        in_params: in_params.iter().map(Param::new).collect(),
        blocks: compiled_blocks,
        out_params: out_params.iter().map(Param::new).collect(),
    })
}

/// A call chain is mono when it names mono functions; mono and
/// reversible links cannot mix within one chain.
fn call_is_mono(line: u32, call: &CallStmt) -> CompileResult<bool> {
    let mono_blocks = call.blocks.iter().filter(|b| is_mono_name(&b.name)).count();
    let mono_params = call
        .in_params
        .iter()
        .chain(&call.out_params)
        .filter(|p| p.is_mono)
        .count();
    if mono_blocks == 0 && mono_params == 0 {
        return Ok(false);
    }
    if mono_blocks == call.blocks.len()
        && mono_params == call.in_params.len() + call.out_params.len()
    {
        return Ok(true);
    }
    Err(CompileError::new(
        line,
        SyntaxErrorKind::IllegalMono,
        "A call chain must be entirely mono or entirely reversible",
    ))
}

pub(crate) fn compile_function(ast: &AstFunction) -> CompileResult<Function> {
    let mut seen: Vec<&str> = Vec::new();
    for name in ast.borrowed_params.iter().chain(&ast.in_params) {
        if seen.contains(&name.as_str()) {
            return Err(CompileError::new(
                ast.line,
                SyntaxErrorKind::NameConflict,
                format!("Duplicate parameter \"{name}\" in function \"{}\"", ast.name),
            ));
        }
        seen.push(name);
    }
    let lines = compile_body(&ast.lines, false)?;
    let mod_reverse = any_mod_reverse(&lines);
    Ok(Function {
        name: ast.name.clone(),
        borrowed_params: ast.borrowed_params.iter().map(Param::new).collect(),
        in_params: ast.in_params.iter().map(Param::new).collect(),
        out_params: ast.out_params.iter().map(Param::new).collect(),
        lines,
        mod_reverse,
    })
}

pub(crate) fn compile_global(
    line: u32,
    name: &str,
    rhs: Option<&AstExpr>,
) -> CompileResult<GlobalDecl> {
    let is_mono = is_mono_name(name);
    let rhs = match rhs {
        Some(rhs) => {
            let rhs = compile_expr(rhs, line)?;
            if rhs.has_mono && !is_mono {
                return Err(CompileError::new(
                    line,
                    SyntaxErrorKind::IllegalMono,
                    format!("Initialising non-mono global \"{name}\" using mono information"),
                ));
            }
            Some(rhs.expr)
        }
        None => None,
    };
    Ok(GlobalDecl {
        name: name.to_owned(),
        is_mono,
        rhs,
    })
}
