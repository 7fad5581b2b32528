//! # Numbers
//!
//! Exact rationals (`BigRational`) and floats tagged with a working precision in bits.
//! Floats are computed in `f64`; the tag records the precision the value was requested at and is
//! propagated through arithmetic as the minimum of the operands, so the least precise input wins.
use num::{BigInt, BigRational};
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg};

/// precision of an `f64` mantissa
pub const DEFAULT_PRECISION: u32 = 53;
/// exponents above this are left unevaluated instead of producing huge rationals
const MAX_EXACT_EXPONENT: i64 = 4096;

#[derive(Clone, Copy)]
pub struct Float {
    pub value: f64,
    pub prec: u32,
}

impl Float {
    pub fn new(value: f64, prec: u32) -> Self {
        Float { value, prec }
    }

    fn normalized_bits(&self) -> u64 {
        if self.value == 0.0 {
            0.0f64.to_bits()
        } else if self.value.is_nan() {
            f64::NAN.to_bits()
        } else {
            self.value.to_bits()
        }
    }
}

// the precision is part of the identity: `exp(1.0)` at 24 bits is not `exp(1.0)` at 53 bits
impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.normalized_bits() == other.normalized_bits() && self.prec == other.prec
    }
}

impl Eq for Float {}

impl Hash for Float {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized_bits().hash(state);
        self.prec.hash(state);
    }
}

impl fmt::Debug for Float {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Number {
    Rational(BigRational),
    Float(Float),
}

impl Number {
    pub fn zero() -> Self {
        Number::Rational(BigRational::zero())
    }

    pub fn one() -> Self {
        Number::Rational(BigRational::one())
    }

    pub fn integer(n: i64) -> Self {
        Number::Rational(BigRational::from_integer(BigInt::from(n)))
    }

    /// `n/d`, normalized; a zero denominator is rejected
    pub fn rational(n: i64, d: i64) -> Option<Self> {
        if d == 0 {
            return None;
        }
        Some(Number::Rational(BigRational::new(
            BigInt::from(n),
            BigInt::from(d),
        )))
    }

    pub fn float(value: f64, prec: u32) -> Self {
        Number::Float(Float::new(value, prec))
    }

    /// exact zero only; a float `0.0` keeps its precision information
    pub fn is_zero(&self) -> bool {
        matches!(self, Number::Rational(r) if r.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Number::Rational(r) if r.is_one())
    }

    pub fn is_minus_one(&self) -> bool {
        matches!(self, Number::Rational(r) if *r == -BigRational::one())
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Number::Rational(r) => r.is_negative(),
            Number::Float(x) => x.value < 0.0,
        }
    }

    pub fn is_positive(&self) -> bool {
        match self {
            Number::Rational(r) => r.is_positive(),
            Number::Float(x) => x.value > 0.0,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Number::Rational(r) if r.is_integer())
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Number::Rational(r) if r.is_integer() => r.to_integer().to_i64(),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Rational(r) => r.to_f64().unwrap_or(f64::NAN),
            Number::Float(x) => x.value,
        }
    }

    /// precision tag of a float, `None` for exact numbers
    pub fn precision(&self) -> Option<u32> {
        match self {
            Number::Float(x) => Some(x.prec),
            Number::Rational(_) => None,
        }
    }

    pub fn abs(&self) -> Number {
        if self.is_negative() { -self } else { self.clone() }
    }

    /// combined precision of a float operation: the minimum of the float operands
    fn joint_precision(&self, other: &Number) -> u32 {
        match (self.precision(), other.precision()) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => DEFAULT_PRECISION,
        }
    }

    /// `self^exp` when it can be represented as a number, `None` when it has to stay symbolic
    pub fn pow(&self, exp: &Number) -> Option<Number> {
        match (self, exp) {
            (Number::Rational(base), Number::Rational(e)) => {
                if !e.is_integer() {
                    if base.is_zero() && e.is_positive() {
                        return Some(Number::zero());
                    }
                    return None;
                }
                let n = e.to_integer().to_i64()?;
                if n.abs() > MAX_EXACT_EXPONENT {
                    return None;
                }
                if base.is_zero() && n < 0 {
                    return None;
                }
                let k = n.unsigned_abs() as u32;
                let numer = base.numer().pow(k);
                let denom = base.denom().pow(k);
                if n >= 0 {
                    Some(Number::Rational(BigRational::new(numer, denom)))
                } else {
                    Some(Number::Rational(BigRational::new(denom, numer)))
                }
            }
            _ => {
                let value = self.to_f64().powf(exp.to_f64());
                if value.is_finite() {
                    Some(Number::float(value, self.joint_precision(exp)))
                } else {
                    None
                }
            }
        }
    }

    /// numeric order; a rational sorts before a float of the same value, a less precise float
    /// before a more precise one
    pub fn cmp_value(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Rational(a), Number::Rational(b)) => a.cmp(b),
            _ => self
                .to_f64()
                .partial_cmp(&other.to_f64())
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.is_float().cmp(&other.is_float()))
                .then_with(|| self.precision().cmp(&other.precision())),
        }
    }
}

impl Add for &Number {
    type Output = Number;

    fn add(self, rhs: &Number) -> Number {
        match (self, rhs) {
            (Number::Rational(a), Number::Rational(b)) => Number::Rational(a + b),
            _ => Number::float(self.to_f64() + rhs.to_f64(), self.joint_precision(rhs)),
        }
    }
}

impl Mul for &Number {
    type Output = Number;

    fn mul(self, rhs: &Number) -> Number {
        match (self, rhs) {
            (Number::Rational(a), Number::Rational(b)) => Number::Rational(a * b),
            _ => Number::float(self.to_f64() * rhs.to_f64(), self.joint_precision(rhs)),
        }
    }
}

impl Neg for &Number {
    type Output = Number;

    fn neg(self) -> Number {
        match self {
            Number::Rational(r) => Number::Rational(-r),
            Number::Float(x) => Number::float(-x.value, x.prec),
        }
    }
}

impl From<BigRational> for Number {
    fn from(r: BigRational) -> Self {
        Number::Rational(r)
    }
}

impl From<BigInt> for Number {
    fn from(n: BigInt) -> Self {
        Number::Rational(BigRational::from_integer(n))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Rational(r) if r.is_integer() => write!(f, "{}", r.numer()),
            Number::Rational(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Number::Float(x) => write!(f, "{:?}", x.value),
        }
    }
}
