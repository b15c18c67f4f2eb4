use super::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Column name to value mapping produced by encoding an entity.
pub type ValueMap = BTreeMap<String, Value>;

/// One result row, keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// Semantic SQL type of a derived column. Executors map these onto their dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Text,
    Boolean,
    Uuid,
    Timestamp,
    Date,
    Time,
}

impl SqlType {
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::SmallInt | Self::Integer | Self::BigInt)
    }

    /// Converts a textual query bound into a value of this column's type,
    /// keeping the text when it does not parse.
    pub fn coerce_text(&self, text: &str) -> Value {
        let trimmed = text.trim();
        let coerced = match self {
            Self::SmallInt | Self::Integer | Self::BigInt => {
                trimmed.parse::<i64>().ok().map(Value::Integer)
            }
            Self::Real | Self::Double => trimmed.parse::<f64>().ok().map(Value::Float),
            Self::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Some(Value::Boolean(true)),
                "false" => Some(Value::Boolean(false)),
                _ => None,
            },
            Self::Uuid => Uuid::parse_str(trimmed).ok().map(Value::Uuid),
            _ => None,
        };
        coerced.unwrap_or_else(|| Value::Text(text.to_string()))
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallInt => write!(f, "SMALLINT"),
            Self::Integer => write!(f, "INTEGER"),
            Self::BigInt => write!(f, "BIGINT"),
            Self::Real => write!(f, "REAL"),
            Self::Double => write!(f, "DOUBLE"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Uuid => write!(f, "UUID"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Date => write!(f, "DATE"),
            Self::Time => write!(f, "TIME"),
        }
    }
}

/// How date/time fields of an entity are written to the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateEncoding {
    /// Seconds since the Unix epoch, as a double.
    #[default]
    Double,
    Timestamp,
    Date,
    Time,
}

impl DateEncoding {
    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::Double => SqlType::Double,
            Self::Timestamp => SqlType::Timestamp,
            Self::Date => SqlType::Date,
            Self::Time => SqlType::Time,
        }
    }
}
