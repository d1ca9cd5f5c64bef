//! The Railway value model: exact rational numbers and nested arrays.
//!
//! Every scalar in Railway is an exact rational backed by arbitrary
//! precision integers. There are no separate integer, float or boolean
//! types; truthiness is `value != 0` and boolean results are the numbers
//! 0 and 1. A memory cell is either a number or an ordered sequence of
//! memory cells, nested arbitrarily deep.

use std::fmt;

use num_bigint::BigInt;
use num_integer::{Integer, Roots};
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};

/// Errors produced by arithmetic on [`Number`]s.
///
/// These are deliberately context-free; the expression evaluator maps
/// them onto the interpreter's error taxonomy (zero-error, value-error)
/// together with the offending source construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    /// Division or modulus by zero, including `0 ** negative`.
    DivisionByZero,
    /// `**` produced a result that is not rational (e.g. `2 ** (1/2)`).
    NonRational,
    /// An exponent too large to evaluate exactly.
    ExponentOverflow,
}

/// An exact rational number.
///
/// Numbers are always stored in normalised form:
/// - the denominator is positive,
/// - numerator and denominator share no common factor,
/// - zero is represented as 0/1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number {
    numerator: BigInt,
    denominator: BigInt,
}

impl Number {
    /// Creates a number from a numerator and denominator.
    ///
    /// Returns `None` when the denominator is zero.
    pub fn new(numerator: BigInt, denominator: BigInt) -> Option<Self> {
        if denominator.is_zero() {
            return None;
        }
        let (n, d) = Self::normalize(numerator, denominator);
        Some(Self {
            numerator: n,
            denominator: d,
        })
    }

    /// The number 0.
    pub fn zero() -> Self {
        Self::from_integer(BigInt::zero())
    }

    /// The number 1.
    pub fn one() -> Self {
        Self::from_integer(BigInt::one())
    }

    /// Creates a whole number.
    pub fn from_integer(value: impl Into<BigInt>) -> Self {
        Self {
            numerator: value.into(),
            denominator: BigInt::one(),
        }
    }

    /// Converts a boolean into the number 1 or 0.
    pub fn from_bool(value: bool) -> Self {
        Self::from_integer(i64::from(value))
    }

    /// Converts an `f64` into the exact rational it denotes.
    ///
    /// The conversion uses the raw bit representation, so the result is
    /// the precise binary value of the float, not a decimal rounding.
    /// Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_nan() || value.is_infinite() {
            return None;
        }
        let bits = value.to_bits();
        let negative = bits >> 63 != 0;
        let raw_exponent = ((bits >> 52) & 0x7ff) as i32;
        let mantissa = if raw_exponent == 0 {
            (bits & 0xf_ffff_ffff_ffff) << 1
        } else {
            (bits & 0xf_ffff_ffff_ffff) | 0x10_0000_0000_0000
        };
        let exponent = raw_exponent - 1023 - 52;

        let mut n = BigInt::from(mantissa);
        let mut d = BigInt::one();
        if exponent > 0 {
            n <<= exponent as u32;
        } else if exponent < 0 {
            d <<= (-exponent) as u32;
        }
        if negative {
            n = -n;
        }
        Self::new(n, d)
    }

    /// Parses a number literal: decimal digits with an optional `/digits`
    /// denominator and an optional leading `-`.
    ///
    /// This accepts both the token shape produced by the lexer (`3`,
    /// `3/4`) and the signed literals the command line driver receives.
    pub fn parse(text: &str) -> Option<Self> {
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (num_text, den_text) = match body.split_once('/') {
            Some((n, d)) => (n, Some(d)),
            None => (body, None),
        };
        if num_text.is_empty() || !num_text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut numerator: BigInt = num_text.parse().ok()?;
        let denominator: BigInt = match den_text {
            Some(d) if !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()) => d.parse().ok()?,
            Some(_) => return None,
            None => BigInt::one(),
        };
        if negative {
            numerator = -numerator;
        }
        Self::new(numerator, denominator)
    }

    pub fn numerator(&self) -> &BigInt {
        &self.numerator
    }

    pub fn denominator(&self) -> &BigInt {
        &self.denominator
    }

    /// Railway truthiness: any non-zero number is true.
    pub fn truthy(&self) -> bool {
        !self.numerator.is_zero()
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.numerator.is_negative()
    }

    /// Whether this number is a whole integer.
    pub fn is_integer(&self) -> bool {
        self.denominator.is_one()
    }

    /// Truncates toward zero, yielding the integer part.
    ///
    /// Used wherever a number is consumed as an index or a dimension.
    pub fn truncate(&self) -> BigInt {
        &self.numerator / &self.denominator
    }

    /// Largest integer not greater than this number.
    pub fn floor(&self) -> BigInt {
        self.numerator.div_floor(&self.denominator)
    }

    /// Smallest integer not less than this number.
    pub fn ceil(&self) -> BigInt {
        self.numerator.div_ceil(&self.denominator)
    }

    /// Normalises: moves the sign to the numerator and reduces by GCD.
    fn normalize(n: BigInt, d: BigInt) -> (BigInt, BigInt) {
        let (mut n, mut d) = if d.is_negative() { (-n, -d) } else { (n, d) };
        let g = n.gcd(&d);
        if !g.is_one() {
            n /= &g;
            d /= &g;
        }
        (n, d)
    }

    fn from_parts(n: BigInt, d: BigInt) -> Self {
        let (n, d) = Self::normalize(n, d);
        Self {
            numerator: n,
            denominator: d,
        }
    }

    pub fn add(&self, rhs: &Self) -> Self {
        Self::from_parts(
            &self.numerator * &rhs.denominator + &rhs.numerator * &self.denominator,
            &self.denominator * &rhs.denominator,
        )
    }

    pub fn sub(&self, rhs: &Self) -> Self {
        Self::from_parts(
            &self.numerator * &rhs.denominator - &rhs.numerator * &self.denominator,
            &self.denominator * &rhs.denominator,
        )
    }

    pub fn mul(&self, rhs: &Self) -> Self {
        Self::from_parts(&self.numerator * &rhs.numerator, &self.denominator * &rhs.denominator)
    }

    pub fn neg(&self) -> Self {
        Self {
            numerator: -self.numerator.clone(),
            denominator: self.denominator.clone(),
        }
    }

    /// Exact rational division.
    pub fn div(&self, rhs: &Self) -> Result<Self, ArithmeticError> {
        if rhs.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        Ok(Self::from_parts(
            &self.numerator * &rhs.denominator,
            &self.denominator * &rhs.numerator,
        ))
    }

    /// Integer division, rounding toward negative infinity.
    pub fn floor_div(&self, rhs: &Self) -> Result<Self, ArithmeticError> {
        let quotient = self.div(rhs)?;
        Ok(Self::from_integer(quotient.floor()))
    }

    /// Floored modulus: the result takes the sign of the divisor, so
    /// `a == b * (a // b) + a % b` holds exactly.
    pub fn rem(&self, rhs: &Self) -> Result<Self, ArithmeticError> {
        let whole = self.floor_div(rhs)?;
        Ok(self.sub(&whole.mul(rhs)))
    }

    /// Exact rational exponentiation.
    ///
    /// Integer exponents always succeed (except `0 ** negative`).
    /// Fractional exponents succeed only when the exact root exists;
    /// anything irrational reports [`ArithmeticError::NonRational`].
    pub fn pow(&self, exp: &Self) -> Result<Self, ArithmeticError> {
        let raised = self.pow_integer(&exp.numerator)?;
        if exp.denominator.is_one() {
            return Ok(raised);
        }
        let degree = exp
            .denominator
            .to_u32()
            .ok_or(ArithmeticError::ExponentOverflow)?;
        let n = exact_root(&raised.numerator, degree)?;
        let d = exact_root(&raised.denominator, degree)?;
        Ok(Self::from_parts(n, d))
    }

    fn pow_integer(&self, exp: &BigInt) -> Result<Self, ArithmeticError> {
        if exp.is_zero() {
            return Ok(Self::one());
        }
        if self.is_zero() {
            if exp.is_negative() {
                return Err(ArithmeticError::DivisionByZero);
            }
            return Ok(Self::zero());
        }
        let magnitude = exp
            .abs()
            .to_u32()
            .ok_or(ArithmeticError::ExponentOverflow)?;
        let n = Pow::pow(&self.numerator, magnitude);
        let d = Pow::pow(&self.denominator, magnitude);
        if exp.is_negative() {
            Ok(Self::from_parts(d, n))
        } else {
            Ok(Self::from_parts(n, d))
        }
    }
}

/// The exact `degree`-th root of an integer, or `NonRational` when the
/// value has no such root. Negative values are rejected for even
/// degrees.
fn exact_root(value: &BigInt, degree: u32) -> Result<BigInt, ArithmeticError> {
    if value.is_negative() {
        if degree % 2 == 0 {
            return Err(ArithmeticError::NonRational);
        }
        return exact_root(&-value, degree).map(|root| -root);
    }
    let root = value.nth_root(degree);
    if Pow::pow(&root, degree) == *value {
        Ok(root)
    } else {
        Err(ArithmeticError::NonRational)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Cross-multiplication is valid because denominators are positive.
        let left = &self.numerator * &other.denominator;
        let right = &other.numerator * &self.denominator;
        left.cmp(&right)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator.is_one() {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

/// A Railway memory cell: a number or a dynamically sized sequence of
/// cells. Arrays may nest arbitrarily and an empty array is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryCell {
    Num(Number),
    Array(Vec<MemoryCell>),
}

/// How two memory cells disagree, distinguished because unlet reports
/// shape mismatches and value mismatches as different error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMismatch {
    Shape,
    Value,
}

impl MemoryCell {
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Num(n) => Some(n),
            Self::Array(_) => None,
        }
    }

    /// Structural and value comparison against another cell.
    pub fn matches(&self, other: &Self) -> Result<(), CellMismatch> {
        match (self, other) {
            (Self::Num(a), Self::Num(b)) => {
                if a == b {
                    Ok(())
                } else {
                    Err(CellMismatch::Value)
                }
            }
            (Self::Array(a), Self::Array(b)) => {
                if a.len() != b.len() {
                    return Err(CellMismatch::Shape);
                }
                for (lhs, rhs) in a.iter().zip(b) {
                    lhs.matches(rhs)?;
                }
                Ok(())
            }
            _ => Err(CellMismatch::Shape),
        }
    }
}

impl fmt::Display for MemoryCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<Number> for MemoryCell {
    fn from(value: Number) -> Self {
        Self::Num(value)
    }
}
