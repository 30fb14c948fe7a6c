//! Algebraic groups attached to aggregable types.
//!
//! An incrementally maintained aggregate combines each new contribution into
//! its running value and combines the inverse of each retracted one.

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use num_bigint::BigInt;

use crate::error::{IrErrorKind, IrResult};
use crate::types::Type;

/// A runtime value of the target language.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(BigInt),
    Double(f64),
    String(String),
    Tuple(Vec<Value>),
    Vector(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(x) => write!(f, "{:?}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Tuple(items) => write!(f, "({})", items.iter().join(", ")),
            Value::Vector(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}

pub trait Group: fmt::Debug + Send + Sync {
    /// The (non-nullable) type whose values form the group's carrier.
    fn element_type(&self) -> Type;

    fn identity(&self) -> Value;

    fn combine(&self, a: &Value, b: &Value) -> IrResult<Value>;

    fn inverse(&self, a: &Value) -> IrResult<Value>;
}

fn unrepresentable<T>(value: &Value, ty: &Type) -> IrResult<T> {
    Err(IrErrorKind::UnrepresentableValue {
        value: value.to_string(),
        ty: ty.clone(),
    }
    .into())
}

/// Addition over `bigint`, or wrapping addition over `signed<N>` and `bit<N>`.
#[derive(Clone, Debug)]
pub struct IntegerGroup {
    ty: Type,
    // (min, max) for fixed-width types
    bounds: Option<(BigInt, BigInt)>,
}

impl IntegerGroup {
    pub fn new(ty: Type) -> Self {
        let bounds = ty.integer_bounds();
        Self { ty, bounds }
    }

    fn check<'a>(&self, value: &'a Value) -> IrResult<&'a BigInt> {
        let Value::Int(n) = value else {
            return unrepresentable(value, &self.ty);
        };
        match &self.bounds {
            Some((min, max)) if n < min || n > max => unrepresentable(value, &self.ty),
            _ => Ok(n),
        }
    }

    fn wrap(&self, n: BigInt) -> BigInt {
        match &self.bounds {
            None => n,
            Some((min, max)) => {
                let modulus: BigInt = max - min + 1;
                let offset = ((n - min) % &modulus + &modulus) % &modulus;
                offset + min
            }
        }
    }
}

impl Group for IntegerGroup {
    fn element_type(&self) -> Type {
        self.ty.clone()
    }

    fn identity(&self) -> Value {
        Value::Int(BigInt::from(0))
    }

    fn combine(&self, a: &Value, b: &Value) -> IrResult<Value> {
        let sum = self.check(a)? + self.check(b)?;
        Ok(Value::Int(self.wrap(sum)))
    }

    fn inverse(&self, a: &Value) -> IrResult<Value> {
        let negated = -self.check(a)?;
        Ok(Value::Int(self.wrap(negated)))
    }
}

#[derive(Clone, Debug)]
pub struct DoubleGroup {
    ty: Type,
}

impl DoubleGroup {
    pub fn new(ty: Type) -> Self {
        Self { ty }
    }

    fn check(&self, value: &Value) -> IrResult<f64> {
        match value {
            Value::Double(x) if x.is_finite() => Ok(*x),
            _ => unrepresentable(value, &self.ty),
        }
    }
}

impl Group for DoubleGroup {
    fn element_type(&self) -> Type {
        self.ty.clone()
    }

    fn identity(&self) -> Value {
        Value::Double(0.0)
    }

    /// Fails if the sum overflows to infinity. Rounding makes the operation
    /// only approximately associative.
    fn combine(&self, a: &Value, b: &Value) -> IrResult<Value> {
        let sum = Value::Double(self.check(a)? + self.check(b)?);
        self.check(&sum)?;
        Ok(sum)
    }

    fn inverse(&self, a: &Value) -> IrResult<Value> {
        Ok(Value::Double(-self.check(a)?))
    }
}

/// Component-wise group over a tuple type.
#[derive(Debug)]
pub struct ProductGroup {
    ty: Type,
    components: Vec<Arc<dyn Group>>,
}

impl ProductGroup {
    pub fn new(ty: Type, components: Vec<Arc<dyn Group>>) -> Self {
        Self { ty, components }
    }

    fn check<'a>(&self, value: &'a Value) -> IrResult<&'a [Value]> {
        match value {
            Value::Tuple(items) if items.len() == self.components.len() => Ok(items),
            _ => unrepresentable(value, &self.ty),
        }
    }
}

impl Group for ProductGroup {
    fn element_type(&self) -> Type {
        self.ty.clone()
    }

    fn identity(&self) -> Value {
        Value::Tuple(self.components.iter().map(|g| g.identity()).collect())
    }

    fn combine(&self, a: &Value, b: &Value) -> IrResult<Value> {
        let items = self
            .components
            .iter()
            .zip(self.check(a)?.iter().zip(self.check(b)?))
            .map(|(group, (a, b))| group.combine(a, b))
            .collect::<IrResult<Vec<_>>>()?;
        Ok(Value::Tuple(items))
    }

    fn inverse(&self, a: &Value) -> IrResult<Value> {
        let items = self
            .components
            .iter()
            .zip(self.check(a)?)
            .map(|(group, a)| group.inverse(a))
            .collect::<IrResult<Vec<_>>>()?;
        Ok(Value::Tuple(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IrErrorKind;
    use crate::types::{group_of, require_group};

    fn int(n: i64) -> Value {
        Value::Int(BigInt::from(n))
    }

    fn assert_inverse_law(group: &dyn Group, values: &[Value]) {
        for x in values {
            let inverse = group.inverse(x).unwrap();
            assert_eq!(group.combine(x, &inverse).unwrap(), group.identity(), "x = {}", x);
            assert_eq!(group.combine(&inverse, x).unwrap(), group.identity(), "x = {}", x);
        }
    }

    #[test]
    fn test_bigint_inverse_law() {
        let group = require_group(&Type::bigint()).unwrap();
        let huge = Value::Int(BigInt::from(i64::MAX) * BigInt::from(i64::MAX));
        assert_inverse_law(&*group, &[int(0), int(1), int(-17), huge]);
    }

    #[test]
    fn test_signed_wraps_around() {
        let group = require_group(&Type::signed(8)).unwrap();
        assert_inverse_law(&*group, &[int(0), int(1), int(-128), int(127), int(-5)]);
        assert_eq!(group.combine(&int(127), &int(1)).unwrap(), int(-128));
        assert_eq!(group.inverse(&int(-128)).unwrap(), int(-128));
    }

    #[test]
    fn test_bit_wraps_around() {
        let group = require_group(&Type::bit(8)).unwrap();
        assert_inverse_law(&*group, &[int(0), int(1), int(128), int(255)]);
        assert_eq!(group.inverse(&int(1)).unwrap(), int(255));
        assert_eq!(group.combine(&int(200), &int(100)).unwrap(), int(44));
    }

    #[test]
    fn test_double_inverse_law() {
        let group = require_group(&Type::double()).unwrap();
        assert_inverse_law(
            &*group,
            &[Value::Double(0.0), Value::Double(2.5), Value::Double(-1e300)],
        );
    }

    #[test]
    fn test_double_overflow_is_rejected() {
        let group = require_group(&Type::double()).unwrap();
        let err = group
            .combine(&Value::Double(f64::MAX), &Value::Double(f64::MAX))
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            IrErrorKind::UnrepresentableValue { ty, .. } if *ty == Type::double()
        ));
    }

    #[test]
    fn test_zero_width_holds_only_zero() {
        let group = require_group(&Type::signed(0)).unwrap();
        assert_inverse_law(&*group, &[int(0)]);
        assert!(group.inverse(&int(-1)).is_err());
    }

    #[test]
    fn test_tuple_group_is_component_wise() {
        let group = require_group(&Type::tuple(vec![Type::bigint(), Type::bit(4)])).unwrap();
        assert_eq!(group.identity(), Value::Tuple(vec![int(0), int(0)]));
        assert_inverse_law(&*group, &[Value::Tuple(vec![int(-3), int(15)])]);
        assert_eq!(
            group
                .combine(
                    &Value::Tuple(vec![int(1), int(15)]),
                    &Value::Tuple(vec![int(2), int(2)])
                )
                .unwrap(),
            Value::Tuple(vec![int(3), int(1)])
        );
    }

    #[test]
    fn test_combine_is_associative() {
        let group = require_group(&Type::signed(16)).unwrap();
        let (a, b, c) = (int(30000), int(12345), int(-32768));
        let left = group
            .combine(&group.combine(&a, &b).unwrap(), &c)
            .unwrap();
        let right = group
            .combine(&a, &group.combine(&b, &c).unwrap())
            .unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn test_rejects_values_outside_carrier() {
        let group = group_of(&Type::bit(8)).unwrap();
        let err = group.inverse(&int(256)).unwrap_err();
        assert_eq!(
            err.kind(),
            &IrErrorKind::UnrepresentableValue {
                value: "256".to_owned(),
                ty: Type::bit(8),
            }
        );
        assert!(group
            .combine(&Value::String("x".to_owned()), &int(1))
            .is_err());

        let pair = group_of(&Type::tuple(vec![Type::bigint(), Type::bigint()])).unwrap();
        assert!(pair.inverse(&Value::Tuple(vec![int(1)])).is_err());
    }
}
