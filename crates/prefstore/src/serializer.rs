use std::{fmt::Display, str::FromStr};

use crate::{ScalarType, ScalarValue, SerializationError};

/// Converts scalar values to and from their canonical text form.
///
/// | Type           | Canonical text                                        |
/// |----------------|-------------------------------------------------------|
/// | string         | the string itself                                     |
/// | int, long      | base 10, `-` for negatives, no `+` or leading zeros   |
/// | float, double  | shortest text that parses back to the same value      |
/// | boolean        | `true` or `false`                                     |
///
/// Decoding is strict: anything [Serializer::encode] would not have produced is rejected.
pub struct Serializer;

impl Serializer {
    /// Encode a value. Fails for non-finite floats.
    pub fn encode(value: &ScalarValue) -> Result<String, SerializationError> {
        match value {
            ScalarValue::String(s) => Ok(s.clone()),
            ScalarValue::Int(v) => Ok(v.to_string()),
            ScalarValue::Long(v) => Ok(v.to_string()),
            ScalarValue::Float(v) if !v.is_finite() => {
                Err(SerializationError::NonFinite(ScalarType::Float))
            }
            ScalarValue::Float(v) => Ok(v.to_string()),
            ScalarValue::Double(v) if !v.is_finite() => {
                Err(SerializationError::NonFinite(ScalarType::Double))
            }
            ScalarValue::Double(v) => Ok(v.to_string()),
            ScalarValue::Boolean(v) => Ok(v.to_string()),
        }
    }

    /// Decode `text` as a value of `scalar_type`.
    pub fn decode(scalar_type: ScalarType, text: &str) -> Result<ScalarValue, SerializationError> {
        let value = match scalar_type {
            ScalarType::String => return Ok(ScalarValue::String(text.to_owned())),
            ScalarType::Int => ScalarValue::Int(parse_canonical(scalar_type, text)?),
            ScalarType::Long => ScalarValue::Long(parse_canonical(scalar_type, text)?),
            ScalarType::Float => {
                let v: f32 = parse_canonical(scalar_type, text)?;
                if !v.is_finite() {
                    return Err(SerializationError::NonFinite(scalar_type));
                }
                ScalarValue::Float(v)
            }
            ScalarType::Double => {
                let v: f64 = parse_canonical(scalar_type, text)?;
                if !v.is_finite() {
                    return Err(SerializationError::NonFinite(scalar_type));
                }
                ScalarValue::Double(v)
            }
            ScalarType::Boolean => ScalarValue::Boolean(parse_canonical(scalar_type, text)?),
        };
        Ok(value)
    }
}

/// Parse `text` and require that formatting the result gives back exactly `text`.
fn parse_canonical<T: FromStr + Display>(
    scalar_type: ScalarType,
    text: &str,
) -> Result<T, SerializationError> {
    let non_canonical = || SerializationError::NonCanonical {
        scalar_type,
        text: text.to_owned(),
    };
    let value: T = text.parse().map_err(|_| non_canonical())?;
    if value.to_string() != text {
        return Err(non_canonical());
    }
    Ok(value)
}
