use crate::ScalarType;

/// A value of one of the supported scalar types.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    String(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
}

impl ScalarValue {
    /// The type of the contained value.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ScalarValue::String(_) => ScalarType::String,
            ScalarValue::Int(_) => ScalarType::Int,
            ScalarValue::Long(_) => ScalarType::Long,
            ScalarValue::Float(_) => ScalarType::Float,
            ScalarValue::Double(_) => ScalarType::Double,
            ScalarValue::Boolean(_) => ScalarType::Boolean,
        }
    }
}

mod private {
    pub trait Sealed {}
}

/// Rust types that can be stored as a preference.
///
/// This trait is sealed and implemented for [String], [i32], [i64], [f32], [f64] and [bool].
pub trait Scalar: private::Sealed + Sized + Send + 'static {
    /// The [ScalarType] values of this Rust type are stored as.
    const SCALAR_TYPE: ScalarType;

    #[allow(missing_docs)]
    fn into_value(self) -> ScalarValue;

    /// Extract the Rust value, or `None` if `value` holds another type.
    fn from_value(value: ScalarValue) -> Option<Self>;
}

macro_rules! impl_scalar {
    ($ty:ty, $variant:ident) => {
        impl private::Sealed for $ty {}

        impl Scalar for $ty {
            const SCALAR_TYPE: ScalarType = ScalarType::$variant;

            fn into_value(self) -> ScalarValue {
                ScalarValue::$variant(self)
            }

            fn from_value(value: ScalarValue) -> Option<Self> {
                match value {
                    ScalarValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_scalar!(String, String);
impl_scalar!(i32, Int);
impl_scalar!(i64, Long);
impl_scalar!(f32, Float);
impl_scalar!(f64, Double);
impl_scalar!(bool, Boolean);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_types_match_values() {
        assert_eq!(7i32.into_value().scalar_type(), i32::SCALAR_TYPE);
        assert_eq!(7i64.into_value().scalar_type(), i64::SCALAR_TYPE);
        assert_eq!(1.5f32.into_value().scalar_type(), f32::SCALAR_TYPE);
        assert_eq!(1.5f64.into_value().scalar_type(), f64::SCALAR_TYPE);
        assert_eq!(true.into_value().scalar_type(), bool::SCALAR_TYPE);
        assert_eq!(
            String::from("x").into_value().scalar_type(),
            String::SCALAR_TYPE
        );
    }

    #[test]
    fn test_from_value_rejects_other_types() {
        assert_eq!(i64::from_value(ScalarValue::Long(3)), Some(3));
        assert_eq!(i64::from_value(ScalarValue::Int(3)), None);
        assert_eq!(bool::from_value(ScalarValue::String("true".into())), None);
    }
}
