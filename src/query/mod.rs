//! Structured query parameters and their translation into filters.

pub mod filter;
pub mod translate;

pub use filter::{Comparison, Filter, Predicate};
pub use translate::{TranslatedQuery, translate, translate_filter};

use crate::core::{RequestError, Result, Value};
use serde::{Deserialize, Serialize};

/// Operator of a [`QueryValue::Compare`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equal,
    GreaterThan,
    GreaterOrEqual,
    LowerThan,
    LowerOrEqual,
    /// `low,high` text; matches `low <= column <= high`.
    InclusiveRange,
    /// `low,high` text; matches `low < column < high`.
    ExclusiveRange,
    /// Comma-separated text; matches any of the listed values.
    OneOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// The value supplied for one field name of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Equals(Value),
    Compare(Operator, Value),
    Range { low: Value, high: Value, inclusive: bool },
    OneOf(Vec<Value>),
    OrderBy(Direction),
    Page { limit: u64, offset: u64 },
}

impl QueryValue {
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            Self::Equals(_) | Self::Compare(..) | Self::Range { .. } | Self::OneOf(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: u64,
    pub offset: u64,
}

/// Field name to [`QueryValue`] entries, in insertion order.
///
/// Inserting a name twice replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    entries: Vec<(String, QueryValue)>,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: QueryValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: QueryValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn equals(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(name, QueryValue::Equals(value.into()))
    }

    pub fn compare(self, name: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.with(name, QueryValue::Compare(operator, value.into()))
    }

    pub fn range(
        self,
        name: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
        inclusive: bool,
    ) -> Self {
        self.with(
            name,
            QueryValue::Range {
                low: low.into(),
                high: high.into(),
                inclusive,
            },
        )
    }

    pub fn one_of<I, V>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(name, QueryValue::OneOf(values.into_iter().map(Into::into).collect()))
    }

    pub fn order_by(self, name: impl Into<String>, direction: Direction) -> Self {
        self.with(name, QueryValue::OrderBy(direction))
    }

    /// Adds a pagination window under the `pagination` key.
    pub fn paginate(self, limit: u64, offset: u64) -> Self {
        self.with("pagination", QueryValue::Page { limit, offset })
    }

    pub fn get(&self, name: &str) -> Option<&QueryValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds equality/membership parameters from a serializable struct.
    ///
    /// Scalar fields become `Equals`, arrays become `OneOf`, `null` fields
    /// are skipped. Nested objects are rejected.
    pub fn from_serializable<T: Serialize>(params: &T) -> Result<Self> {
        let json = serde_json::to_value(params)
            .map_err(|err| RequestError::query(format!("Could not encode query parameters: {}", err)))?;
        let serde_json::Value::Object(object) = json else {
            return Err(RequestError::query(
                "Query parameters must serialize to an object",
            ));
        };

        let mut query = Self::new();
        for (name, value) in object {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::Array(items) => {
                    let values = items
                        .into_iter()
                        .map(|item| json_scalar(&name, item))
                        .collect::<Result<Vec<_>>>()?;
                    query.insert(name, QueryValue::OneOf(values));
                }
                other => {
                    let value = json_scalar(&name, other)?;
                    query.insert(name, QueryValue::Equals(value));
                }
            }
        }
        Ok(query)
    }
}

fn json_scalar(name: &str, value: serde_json::Value) -> Result<Value> {
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(b)),
        serde_json::Value::String(s) => Ok(Value::Text(s)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float))
            .ok_or_else(|| RequestError::query(format!("Unsupported number {} for '{}'", n, name))),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(RequestError::query(
            format!("Nested value for query parameter '{}' is not supported", name),
        )),
    }
}
