use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::value::Value;

/// Primitive type of an attribute.
///
/// Every attribute value is stored as the literal produced by
/// [`DataType::to_literal`] and read back with [`DataType::parse`]; two
/// values are equal for search purposes iff their literals are equal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Int,
    Float,
    Bool,
    /// Byte strings, stored hex-encoded.
    Bytes,
    /// One literal out of a closed set.
    Enum(Vec<String>),
}

impl DataType {
    /// Serialize a value into its stored literal.
    pub fn to_literal(&self, value: &Value) -> SchemaResult<String> {
        match (self, value) {
            (Self::String, Value::String(s)) => Ok(s.clone()),
            (Self::Int, Value::Int(i)) => Ok(i.to_string()),
            (Self::Float, Value::Float(f)) => Ok(f.to_string()),
            (Self::Float, Value::Int(i)) => Ok((*i as f64).to_string()),
            (Self::Bool, Value::Bool(b)) => Ok(b.to_string()),
            (Self::Bytes, Value::Bytes(b)) => Ok(hex::encode(b)),
            (Self::Enum(literals), Value::Enum(s) | Value::String(s)) => {
                if literals.iter().any(|l| l == s) {
                    Ok(s.clone())
                } else {
                    Err(self.invalid(s))
                }
            }
            (_, other) => Err(SchemaError::TypeMismatch {
                expected: self.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    /// Parse a stored literal back into a value.
    pub fn parse(&self, literal: &str) -> SchemaResult<Value> {
        match self {
            Self::String => Ok(Value::String(literal.to_string())),
            Self::Int => literal
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| self.invalid(literal)),
            Self::Float => literal
                .trim()
                .parse()
                .map(Value::Float)
                .map_err(|_| self.invalid(literal)),
            Self::Bool => match literal.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(self.invalid(literal)),
            },
            Self::Bytes => hex::decode(literal.trim())
                .map(Value::Bytes)
                .map_err(|_| self.invalid(literal)),
            Self::Enum(literals) => {
                if literals.iter().any(|l| l == literal) {
                    Ok(Value::Enum(literal.to_string()))
                } else {
                    Err(self.invalid(literal))
                }
            }
        }
    }

    /// Re-serialize a document literal into canonical stored form.
    pub fn normalize(&self, literal: &str) -> SchemaResult<String> {
        self.to_literal(&self.parse(literal)?)
    }

    fn invalid(&self, literal: &str) -> SchemaError {
        SchemaError::InvalidLiteral {
            data_type: self.to_string(),
            literal: literal.to_string(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::Bytes => write!(f, "bytes"),
            Self::Enum(_) => write!(f, "enum"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_literal_roundtrip() {
        let lit = DataType::Int.to_literal(&Value::Int(-42)).unwrap();
        assert_eq!(lit, "-42");
        assert_eq!(DataType::Int.parse(&lit).unwrap(), Value::Int(-42));
    }

    #[test]
    fn float_accepts_int_values() {
        let lit = DataType::Float.to_literal(&Value::Int(3)).unwrap();
        assert_eq!(DataType::Float.parse(&lit).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn bytes_are_hex() {
        let lit = DataType::Bytes.to_literal(&Value::Bytes(vec![0xde, 0xad])).unwrap();
        assert_eq!(lit, "dead");
    }

    #[test]
    fn enum_rejects_unknown_literal() {
        let dt = DataType::Enum(vec!["RED".into(), "GREEN".into()]);
        assert_eq!(dt.parse("RED").unwrap(), Value::Enum("RED".into()));
        assert!(matches!(dt.parse("BLUE"), Err(SchemaError::InvalidLiteral { .. })));
        assert!(dt.to_literal(&Value::Enum("BLUE".into())).is_err());
    }

    #[test]
    fn mismatch_is_reported() {
        let err = DataType::Bool.to_literal(&Value::Int(1)).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn bad_literals_are_rejected() {
        assert!(DataType::Int.parse("twelve").is_err());
        assert!(DataType::Bool.parse("yes").is_err());
        assert!(DataType::Bytes.parse("zz").is_err());
    }

    #[test]
    fn normalize_trims_numbers() {
        assert_eq!(DataType::Int.normalize(" 7 ").unwrap(), "7");
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&DataType::Int).unwrap();
        assert_eq!(json, "\"int\"");
        let dt: DataType = serde_json::from_str(r#"{"enum":["A","B"]}"#).unwrap();
        assert_eq!(dt, DataType::Enum(vec!["A".into(), "B".into()]));
    }
}
