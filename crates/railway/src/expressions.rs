//! The compiled expression tree and its evaluator.
//!
//! Expressions are pure: evaluation reads the scope and produces an
//! owned [`MemoryCell`]. Writes go through [`Lookup::set`], which
//! navigates to the addressed cell in place. The `&` and `|` operators
//! have their own evaluation paths so the right operand is only
//! evaluated when needed.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};
use smallvec::SmallVec;
use strum::IntoStaticStr;

use crate::{
    exception::{ErrorKind, RailwayError},
    scope::Scope,
    value::{ArithmeticError, MemoryCell, Number},
};

/// Binary operators. All operate on numbers only; `&` and `|`
/// short-circuit and coerce to 0/1, as do the comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub(crate) enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "//")]
    IDiv,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "**")]
    Pow,
    #[strum(serialize = "^")]
    Xor,
    #[strum(serialize = "|")]
    Or,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    Leq,
    #[strum(serialize = ">")]
    Great,
    #[strum(serialize = ">=")]
    Geq,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Neq,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        self.into()
    }

    /// Applies the operator to two numbers. Short-circuiting of `&` and
    /// `|` happens in [`Expr::eval`]; by the time we get here both
    /// operands exist.
    pub fn apply(self, lhs: &Number, rhs: &Number) -> Result<Number, ArithmeticError> {
        Ok(match self {
            Self::Add => lhs.add(rhs),
            Self::Sub => lhs.sub(rhs),
            Self::Mul => lhs.mul(rhs),
            Self::Div => lhs.div(rhs)?,
            Self::IDiv => lhs.floor_div(rhs)?,
            Self::Mod => lhs.rem(rhs)?,
            Self::Pow => lhs.pow(rhs)?,
            Self::Xor => Number::from_bool(lhs.truthy() ^ rhs.truthy()),
            Self::Or => Number::from_bool(lhs.truthy() | rhs.truthy()),
            Self::And => Number::from_bool(lhs.truthy() & rhs.truthy()),
            Self::Less => Number::from_bool(lhs < rhs),
            Self::Leq => Number::from_bool(lhs <= rhs),
            Self::Great => Number::from_bool(lhs > rhs),
            Self::Geq => Number::from_bool(lhs >= rhs),
            Self::Eq => Number::from_bool(lhs == rhs),
            Self::Neq => Number::from_bool(lhs != rhs),
        })
    }
}

/// Unary operators: negation and logical not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub(crate) enum UnaryOp {
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "!")]
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        self.into()
    }

    pub fn apply(self, value: &Number) -> Number {
        match self {
            Self::Neg => value.neg(),
            Self::Not => Number::from_bool(!value.truthy()),
        }
    }
}

/// A variable reference with zero or more index expressions.
///
/// The root cell is the variable's memory; each index navigates one
/// level of nesting. Indices truncate toward zero and may be negative
/// down to `-len`, counting from the end.
#[derive(Debug, Clone)]
pub(crate) struct Lookup {
    pub name: String,
    pub index: Vec<Expr>,
    /// Whether the name itself is mono (starts with `.`).
    pub mono_name: bool,
}

impl Lookup {
    pub fn bare(name: impl Into<String>) -> Self {
        let name = name.into();
        let mono_name = name.starts_with('.');
        Self {
            name,
            index: Vec::new(),
            mono_name,
        }
    }

    /// Evaluates all index expressions to integers.
    pub fn indices(&self, scope: &Scope) -> Result<SmallVec<[BigInt; 4]>, RailwayError> {
        self.index
            .iter()
            .map(|expr| Ok(expr.eval_number(scope, "index")?.truncate()))
            .collect()
    }

    /// Reads the addressed cell, deep-copying it out of the variable.
    pub fn eval(&self, scope: &Scope) -> Result<MemoryCell, RailwayError> {
        let var = scope.lookup(&self.name)?;
        let indices = self.indices(scope)?;
        let memory = var.read();
        if var.is_array {
            if indices.is_empty() {
                return Ok(MemoryCell::Array(memory.clone()));
            }
            let mut level: &[MemoryCell] = &memory;
            for (depth, index) in indices.iter().enumerate() {
                let slot = resolve_index(level.len(), index)
                    .ok_or_else(|| self.index_error(scope, &indices, false))?;
                let cell = &level[slot];
                if depth + 1 == indices.len() {
                    return Ok(cell.clone());
                }
                match cell {
                    MemoryCell::Array(inner) => level = inner,
                    MemoryCell::Num(_) => {
                        return Err(self.index_error(scope, &indices, true));
                    }
                }
            }
            unreachable!("loop returns on the final index")
        } else {
            if !indices.is_empty() {
                return Err(scope.error(
                    ErrorKind::IndexError,
                    format!("Indexing into \"{}\" which is a number", self.name),
                ));
            }
            Ok(memory[0].clone())
        }
    }

    /// Writes a number into the addressed cell. The target must hold a
    /// number; overwriting an array slot with a number is a type error.
    pub fn set(&self, scope: &Scope, value: Number) -> Result<(), RailwayError> {
        let var = scope.lookup(&self.name)?;
        let indices = self.indices(scope)?;
        if var.is_array {
            if indices.is_empty() {
                return Err(scope.error(
                    ErrorKind::TypeError,
                    format!("Trying to modify array \"{}\" with a number", self.name),
                ));
            }
            let mut memory = var.write();
            let mut level: &mut Vec<MemoryCell> = &mut memory;
            for index in &indices[..indices.len() - 1] {
                let slot = resolve_index(level.len(), index)
                    .ok_or_else(|| self.index_error(scope, &indices, false))?;
                match &mut level[slot] {
                    MemoryCell::Array(inner) => level = inner,
                    MemoryCell::Num(_) => {
                        return Err(self.index_error(scope, &indices, true));
                    }
                }
            }
            let last = &indices[indices.len() - 1];
            let slot = resolve_index(level.len(), last)
                .ok_or_else(|| self.index_error(scope, &indices, false))?;
            match &mut level[slot] {
                MemoryCell::Num(target) => *target = value,
                MemoryCell::Array(_) => {
                    return Err(scope.error(
                        ErrorKind::TypeError,
                        format!(
                            "Trying to modify array \"{}\" with a number",
                            self.render(&indices)
                        ),
                    ));
                }
            }
            Ok(())
        } else {
            if !indices.is_empty() {
                return Err(scope.error(
                    ErrorKind::IndexError,
                    format!("Indexing into \"{}\" which is a number", self.name),
                ));
            }
            var.write()[0] = MemoryCell::Num(value);
            Ok(())
        }
    }

    fn render(&self, indices: &[BigInt]) -> String {
        let mut out = self.name.clone();
        for index in indices {
            out.push('[');
            out.push_str(&index.to_string());
            out.push(']');
        }
        out
    }

    fn index_error(&self, scope: &Scope, indices: &[BigInt], into_number: bool) -> RailwayError {
        let target = self.render(indices);
        let message = if into_number {
            format!("Indexing into number during lookup of \"{target}\"")
        } else {
            format!("Out of bounds error accessing \"{target}\"")
        };
        scope.error(ErrorKind::IndexError, message)
    }
}

/// Maps an index to a slot, accepting negatives down to `-len`.
fn resolve_index(len: usize, index: &BigInt) -> Option<usize> {
    let len_int = BigInt::from(len);
    let shifted = if index.is_negative() { index + &len_int } else { index.clone() };
    if shifted.is_negative() || shifted >= len_int {
        return None;
    }
    shifted.to_usize()
}

/// A compiled expression.
#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Const(Number),
    Lookup(Lookup),
    /// `#x`: top-level element count of an array cell.
    Length(Lookup),
    Binop {
        lhs: Box<Expr>,
        op: BinaryOp,
        rhs: Box<Expr>,
    },
    Uniop {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// `[e1, e2, …]`
    ArrayLiteral(Vec<Expr>),
    /// `[start to stop by step]`
    ArrayRange {
        start: Box<Expr>,
        stop: Box<Expr>,
        step: Box<Expr>,
    },
    /// `[fill tensor dims]`
    ArrayTensor {
        fill: Box<Expr>,
        dims: Box<Expr>,
    },
    /// `TID`: 0-based thread index, -1 outside a parallel call.
    ThreadId,
    /// `#TID`: thread count, -1 outside a parallel call.
    NumThreads,
}

impl Expr {
    pub fn eval(&self, scope: &Scope) -> Result<MemoryCell, RailwayError> {
        match self {
            Self::Const(value) => Ok(MemoryCell::Num(value.clone())),
            Self::Lookup(lookup) => lookup.eval(scope),
            Self::Length(lookup) => {
                let cell = lookup.eval(scope)?;
                match cell {
                    MemoryCell::Array(items) => {
                        Ok(MemoryCell::Num(Number::from_integer(items.len() as i64)))
                    }
                    MemoryCell::Num(_) => Err(scope.error(
                        ErrorKind::TypeError,
                        format!(
                            "Variable \"{}\" has no length as it is not an array",
                            lookup.name
                        ),
                    )),
                }
            }
            Self::Binop { lhs, op, rhs } => {
                let left = lhs.eval_number(scope, op.symbol())?;
                // Short-circuit paths: the right operand is evaluated
                // only when it can still affect the result.
                match op {
                    BinaryOp::And if !left.truthy() => {
                        return Ok(MemoryCell::Num(Number::zero()));
                    }
                    BinaryOp::Or if left.truthy() => {
                        return Ok(MemoryCell::Num(Number::one()));
                    }
                    _ => {}
                }
                let right = rhs.eval_number(scope, op.symbol())?;
                match op.apply(&left, &right) {
                    Ok(result) => Ok(MemoryCell::Num(result)),
                    Err(err) => Err(arithmetic_error(scope, *op, err)),
                }
            }
            Self::Uniop { op, expr } => {
                let value = expr.eval_number(scope, op.symbol())?;
                Ok(MemoryCell::Num(op.apply(&value)))
            }
            Self::ArrayLiteral(items) => {
                let cells = items
                    .iter()
                    .map(|item| item.eval(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MemoryCell::Array(cells))
            }
            Self::ArrayRange { .. } | Self::ArrayTensor { .. } => {
                let iter = IterSource::new(self, scope)?;
                let cells = (0..iter.len()).map(|i| iter.get(i)).collect();
                Ok(MemoryCell::Array(cells))
            }
            Self::ThreadId => Ok(MemoryCell::Num(scope.thread_number())),
            Self::NumThreads => Ok(MemoryCell::Num(scope.thread_count())),
        }
    }

    /// Evaluates and requires a number; arrays are a type error named
    /// after the consuming construct.
    pub fn eval_number(&self, scope: &Scope, context: &str) -> Result<Number, RailwayError> {
        match self.eval(scope)? {
            MemoryCell::Num(value) => Ok(value),
            MemoryCell::Array(_) => Err(scope.error(
                ErrorKind::TypeError,
                format!("Operation \"{context}\" does not accept arrays"),
            )),
        }
    }
}

pub(crate) fn arithmetic_error(scope: &Scope, op: BinaryOp, err: ArithmeticError) -> RailwayError {
    match err {
        ArithmeticError::DivisionByZero => scope.error(
            ErrorKind::ZeroError,
            format!("Zero in binary operation \"{}\"", op.symbol()),
        ),
        ArithmeticError::NonRational => scope.error(
            ErrorKind::ValueError,
            "Result of \"**\" is not a rational number",
        ),
        ArithmeticError::ExponentOverflow => scope.error(
            ErrorKind::ValueError,
            "Exponent too large for exact arithmetic",
        ),
    }
}

/// An indexable element source for `for` and `try` iteration.
///
/// Ranges stay lazy: their length is computed up front and elements are
/// derived on demand, never materialised. Every other iterator
/// expression is evaluated once into an owned sequence.
#[derive(Debug)]
pub(crate) enum IterSource {
    Cells(Vec<MemoryCell>),
    Range {
        start: Number,
        step: Number,
        len: usize,
    },
}

impl IterSource {
    pub fn new(expr: &Expr, scope: &Scope) -> Result<Self, RailwayError> {
        match expr {
            Expr::ArrayRange { start, stop, step } => {
                let start = start.eval_number(scope, "to")?;
                let stop = stop.eval_number(scope, "to")?;
                let step = step.eval_number(scope, "by")?;
                if step.is_zero() {
                    return Err(scope.error(ErrorKind::ValueError, "Range has a step of zero"));
                }
                let span = match stop.sub(&start).div(&step) {
                    Ok(span) => span,
                    Err(_) => return Err(scope.error(ErrorKind::ValueError, "Range has a step of zero")),
                };
                let len = if span.truthy() && !span.is_negative() {
                    span.ceil().to_usize().ok_or_else(|| {
                        scope.error(ErrorKind::ValueError, "Range is too long to iterate")
                    })?
                } else {
                    0
                };
                Ok(Self::Range { start, step, len })
            }
            Expr::ArrayTensor { fill, dims } => {
                let fill = fill.eval(scope)?;
                let dims = dims.eval(scope)?;
                let MemoryCell::Array(dim_cells) = dims else {
                    return Err(scope.error(
                        ErrorKind::TypeError,
                        "Tensor dimensions must be an array of numbers",
                    ));
                };
                let mut lengths = Vec::with_capacity(dim_cells.len());
                for cell in &dim_cells {
                    let Some(value) = cell.as_number() else {
                        return Err(scope.error(
                            ErrorKind::TypeError,
                            "Tensor dimensions must be an array of numbers",
                        ));
                    };
                    if value.is_negative() {
                        return Err(scope.error(
                            ErrorKind::ValueError,
                            "Tensor dimensions must be non-negative",
                        ));
                    }
                    let length = value.truncate().to_usize().ok_or_else(|| {
                        scope.error(ErrorKind::ValueError, "Tensor dimension is too large")
                    })?;
                    lengths.push(length);
                }
                if lengths.is_empty() {
                    return Err(scope.error(
                        ErrorKind::ValueError,
                        "Tensor needs at least one dimension",
                    ));
                }
                if lengths[..lengths.len() - 1].contains(&0) {
                    return Err(scope.error(
                        ErrorKind::ValueError,
                        "Only the final tensor dimension may be zero",
                    ));
                }
                let MemoryCell::Array(cells) = build_tensor(&lengths, &fill) else {
                    unreachable!("tensor with at least one dimension is an array");
                };
                Ok(Self::Cells(cells))
            }
            other => match other.eval(scope)? {
                MemoryCell::Array(cells) => Ok(Self::Cells(cells)),
                MemoryCell::Num(_) => Err(scope.error(
                    ErrorKind::TypeError,
                    "Iterating over a number; an array or range is required",
                )),
            },
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Cells(cells) => cells.len(),
            Self::Range { len, .. } => *len,
        }
    }

    pub fn get(&self, index: usize) -> MemoryCell {
        match self {
            Self::Cells(cells) => cells[index].clone(),
            Self::Range { start, step, .. } => {
                let offset = step.mul(&Number::from_integer(index as i64));
                MemoryCell::Num(start.add(&offset))
            }
        }
    }
}

fn build_tensor(lengths: &[usize], fill: &MemoryCell) -> MemoryCell {
    match lengths.split_first() {
        Some((&head, rest)) => {
            MemoryCell::Array((0..head).map(|_| build_tensor(rest, fill)).collect())
        }
        None => fill.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        exception::StackFrame,
        function::FunctionTable,
        io::{NoPrint, shared_writer},
        scope::Variable,
    };

    fn n(v: i64) -> Number {
        Number::from_integer(v)
    }

    fn cell(v: i64) -> MemoryCell {
        MemoryCell::Num(n(v))
    }

    fn test_scope() -> Scope {
        let mut scope = Scope::new(
            "test",
            Arc::new(RwLock::new(ahash::AHashMap::new())),
            Arc::new(FunctionTable::new()),
            vec![StackFrame::new("test")],
            None,
            shared_writer(NoPrint),
        );
        scope
            .assign("x", Variable::scalar(Number::parse("1/2").unwrap(), false))
            .unwrap();
        scope
            .assign(
                "grid",
                Variable::array(
                    vec![
                        MemoryCell::Array(vec![cell(1), cell(2)]),
                        MemoryCell::Array(vec![cell(3), cell(4)]),
                    ],
                    false,
                ),
            )
            .unwrap();
        scope
    }

    fn lookup(name: &str, index: Vec<Expr>) -> Lookup {
        let mut l = Lookup::bare(name);
        l.index = index;
        l
    }

    #[test]
    fn lookup_navigates_nested_arrays() {
        let scope = test_scope();
        let l = lookup("grid", vec![Expr::Const(n(1)), Expr::Const(n(0))]);
        assert_eq!(l.eval(&scope).unwrap(), cell(3));
        // Negative indices count from the end.
        let l = lookup("grid", vec![Expr::Const(n(-1)), Expr::Const(n(-1))]);
        assert_eq!(l.eval(&scope).unwrap(), cell(4));
    }

    #[test]
    fn lookup_failures() {
        let scope = test_scope();
        let oob = lookup("grid", vec![Expr::Const(n(5))]);
        assert_eq!(oob.eval(&scope).unwrap_err().kind, ErrorKind::IndexError);
        let neg = lookup("grid", vec![Expr::Const(n(-3))]);
        assert_eq!(neg.eval(&scope).unwrap_err().kind, ErrorKind::IndexError);
        let into_num = lookup("grid", vec![Expr::Const(n(0)), Expr::Const(n(0)), Expr::Const(n(0))]);
        assert_eq!(into_num.eval(&scope).unwrap_err().kind, ErrorKind::IndexError);
        let scalar_index = lookup("x", vec![Expr::Const(n(0))]);
        assert_eq!(scalar_index.eval(&scope).unwrap_err().kind, ErrorKind::IndexError);
        let missing = Lookup::bare("nope");
        assert_eq!(missing.eval(&scope).unwrap_err().kind, ErrorKind::UndefinedVariable);
    }

    #[test]
    fn set_writes_scalars_only() {
        let scope = test_scope();
        lookup("grid", vec![Expr::Const(n(0)), Expr::Const(n(1))])
            .set(&scope, n(9))
            .unwrap();
        assert_eq!(
            lookup("grid", vec![Expr::Const(n(0)), Expr::Const(n(1))])
                .eval(&scope)
                .unwrap(),
            cell(9)
        );
        // Writing a number over an array slot is a type error.
        let err = lookup("grid", vec![Expr::Const(n(0))]).set(&scope, n(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        // Bare scalar writes go to the single cell.
        Lookup::bare("x").set(&scope, n(7)).unwrap();
        assert_eq!(Lookup::bare("x").eval(&scope).unwrap(), cell(7));
    }

    #[test]
    fn short_circuit_skips_rhs() {
        let scope = test_scope();
        // The right operand would fail with undefined-variable if
        // evaluated; short-circuiting must avoid that.
        let and = Expr::Binop {
            lhs: Box::new(Expr::Const(n(0))),
            op: BinaryOp::And,
            rhs: Box::new(Expr::Lookup(Lookup::bare("missing"))),
        };
        assert_eq!(and.eval(&scope).unwrap(), cell(0));
        let or = Expr::Binop {
            lhs: Box::new(Expr::Const(n(3))),
            op: BinaryOp::Or,
            rhs: Box::new(Expr::Lookup(Lookup::bare("missing"))),
        };
        assert_eq!(or.eval(&scope).unwrap(), cell(1));
    }

    #[test]
    fn arrays_are_rejected_by_scalar_operators() {
        let scope = test_scope();
        let add = Expr::Binop {
            lhs: Box::new(Expr::Lookup(Lookup::bare("grid"))),
            op: BinaryOp::Add,
            rhs: Box::new(Expr::Const(n(1))),
        };
        assert_eq!(add.eval(&scope).unwrap_err().kind, ErrorKind::TypeError);
        let neg = Expr::Uniop {
            op: UnaryOp::Neg,
            expr: Box::new(Expr::Lookup(Lookup::bare("grid"))),
        };
        assert_eq!(neg.eval(&scope).unwrap_err().kind, ErrorKind::TypeError);
    }

    #[test]
    fn division_by_zero_is_zero_error() {
        let scope = test_scope();
        let div = Expr::Binop {
            lhs: Box::new(Expr::Const(n(1))),
            op: BinaryOp::Div,
            rhs: Box::new(Expr::Const(n(0))),
        };
        assert_eq!(div.eval(&scope).unwrap_err().kind, ErrorKind::ZeroError);
    }

    #[test]
    fn length_of_arrays_and_numbers() {
        let scope = test_scope();
        assert_eq!(Expr::Length(Lookup::bare("grid")).eval(&scope).unwrap(), cell(2));
        assert_eq!(
            Expr::Length(Lookup::bare("x")).eval(&scope).unwrap_err().kind,
            ErrorKind::TypeError
        );
    }

    #[test]
    fn range_lengths_and_elements() {
        let scope = test_scope();
        let range = Expr::ArrayRange {
            start: Box::new(Expr::Const(n(0))),
            stop: Box::new(Expr::Const(n(4))),
            step: Box::new(Expr::Const(n(1))),
        };
        let iter = IterSource::new(&range, &scope).unwrap();
        assert_eq!(iter.len(), 4);
        assert_eq!(iter.get(3), cell(3));

        let descending = Expr::ArrayRange {
            start: Box::new(Expr::Const(n(4))),
            stop: Box::new(Expr::Const(n(0))),
            step: Box::new(Expr::Const(n(-1))),
        };
        let iter = IterSource::new(&descending, &scope).unwrap();
        assert_eq!(iter.len(), 4);
        assert_eq!(iter.get(0), cell(4));
        assert_eq!(iter.get(3), cell(1));

        let empty = Expr::ArrayRange {
            start: Box::new(Expr::Const(n(3))),
            stop: Box::new(Expr::Const(n(3))),
            step: Box::new(Expr::Const(n(1))),
        };
        assert_eq!(IterSource::new(&empty, &scope).unwrap().len(), 0);

        let zero_step = Expr::ArrayRange {
            start: Box::new(Expr::Const(n(0))),
            stop: Box::new(Expr::Const(n(4))),
            step: Box::new(Expr::Const(n(0))),
        };
        assert_eq!(
            IterSource::new(&zero_step, &scope).unwrap_err().kind,
            ErrorKind::ValueError
        );
    }

    #[test]
    fn fractional_range_rounds_up() {
        let scope = test_scope();
        let range = Expr::ArrayRange {
            start: Box::new(Expr::Const(n(0))),
            stop: Box::new(Expr::Const(Number::parse("9/2").unwrap())),
            step: Box::new(Expr::Const(n(1))),
        };
        // 0, 1, 2, 3, 4 are all strictly below 9/2.
        assert_eq!(IterSource::new(&range, &scope).unwrap().len(), 5);
    }

    #[test]
    fn tensor_builds_nested_shape() {
        let scope = test_scope();
        let tensor = Expr::ArrayTensor {
            fill: Box::new(Expr::Const(n(7))),
            dims: Box::new(Expr::ArrayLiteral(vec![Expr::Const(n(2)), Expr::Const(n(3))])),
        };
        let value = tensor.eval(&scope).unwrap();
        let expected = MemoryCell::Array(vec![
            MemoryCell::Array(vec![cell(7), cell(7), cell(7)]),
            MemoryCell::Array(vec![cell(7), cell(7), cell(7)]),
        ]);
        assert_eq!(value, expected);
    }

    #[test]
    fn tensor_zero_dimension_rules() {
        let scope = test_scope();
        let trailing_zero = Expr::ArrayTensor {
            fill: Box::new(Expr::Const(n(0))),
            dims: Box::new(Expr::ArrayLiteral(vec![Expr::Const(n(2)), Expr::Const(n(0))])),
        };
        assert_eq!(
            trailing_zero.eval(&scope).unwrap(),
            MemoryCell::Array(vec![MemoryCell::Array(vec![]), MemoryCell::Array(vec![])])
        );
        let interior_zero = Expr::ArrayTensor {
            fill: Box::new(Expr::Const(n(0))),
            dims: Box::new(Expr::ArrayLiteral(vec![Expr::Const(n(0)), Expr::Const(n(2))])),
        };
        assert_eq!(interior_zero.eval(&scope).unwrap_err().kind, ErrorKind::ValueError);
        let negative = Expr::ArrayTensor {
            fill: Box::new(Expr::Const(n(0))),
            dims: Box::new(Expr::ArrayLiteral(vec![Expr::Const(n(-1))])),
        };
        assert_eq!(negative.eval(&scope).unwrap_err().kind, ErrorKind::ValueError);
    }

    #[test]
    fn thread_expressions_use_sentinels_outside_parallel() {
        let scope = test_scope();
        assert_eq!(Expr::ThreadId.eval(&scope).unwrap(), cell(-1));
        assert_eq!(Expr::NumThreads.eval(&scope).unwrap(), cell(-1));
    }
}
