//! The entity contract.
//!
//! A persistable type implements [`Model`] (normally through
//! `#[derive(Model)]`), and every one of its field types implements
//! [`FieldKind`], which both classifies the field for schema derivation and
//! converts it to and from a column [`Value`].

use crate::core::{DateEncoding, RequestError, Result, Row, Value, ValueMap};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use uuid::Uuid;

/// A persistable entity with an optional 64-bit identity.
///
/// The identity is unset until the entity is first saved; the orchestrator
/// writes it back into the saved copy and never touches it afterwards.
pub trait Model: Clone + Send + Sync + 'static {
    /// Type name used as the schema cache key and to derive the table name.
    const TYPE_NAME: &'static str;
    /// Name of the identity field.
    const ID_FIELD: &'static str = "id";

    /// Format in which date/time fields are written. Defaults to [`DateEncoding::Double`].
    fn date_encoding() -> DateEncoding {
        DateEncoding::Double
    }

    /// Declared shape of the entity, enumerated by the type itself.
    fn entity_shape() -> EntityShape;

    fn model_id(&self) -> Option<i64>;

    fn set_model_id(&mut self, id: Option<i64>);

    /// Encodes every persisted field, `Value::Null` standing in for unset optionals.
    fn encode(&self, encoding: DateEncoding) -> Result<ValueMap>;

    fn decode(row: &Row, encoding: DateEncoding) -> Result<Self>;
}

/// Top-level shape of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityShape {
    /// A record with named fields, in declaration order.
    Keyed(Vec<FieldShape>),
    /// A sequence-like type without field names.
    Unkeyed,
    /// A single bare value.
    Single(DeclaredType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    pub name: &'static str,
    pub declared: DeclaredType,
}

impl FieldShape {
    pub fn new(name: &'static str, declared: DeclaredType) -> Self {
        Self { name, declared }
    }
}

/// Classification of a field's Rust type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
    Bool,
    Bytes,
    Uuid,
    DateTime,
    Url,
    /// Reference to another entity, by its type name.
    Entity(&'static str),
    Optional(Box<DeclaredType>),
    /// Maps and free-form objects.
    Composite(&'static str),
    /// Arrays and sets.
    Collection(&'static str),
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int16 => write!(f, "Int16"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::Float => write!(f, "Float"),
            Self::Double => write!(f, "Double"),
            Self::String => write!(f, "String"),
            Self::Bool => write!(f, "Bool"),
            Self::Bytes => write!(f, "Bytes"),
            Self::Uuid => write!(f, "Uuid"),
            Self::DateTime => write!(f, "DateTime"),
            Self::Url => write!(f, "Url"),
            Self::Entity(name) => write!(f, "Entity<{}>", name),
            Self::Optional(inner) => write!(f, "Option<{}>", inner),
            Self::Composite(name) => write!(f, "{}", name),
            Self::Collection(name) => write!(f, "{}", name),
        }
    }
}

/// A type that can be a field of a [`Model`].
pub trait FieldKind: Sized {
    fn declared_type() -> DeclaredType;

    fn to_value(&self, encoding: DateEncoding) -> Result<Value>;

    /// `value` is `None` when the row has no such column.
    fn from_value(value: Option<&Value>, encoding: DateEncoding) -> Result<Self>;

    #[doc(hidden)]
    fn is_byte() -> bool {
        false
    }

    #[doc(hidden)]
    fn as_byte(&self) -> Option<u8> {
        None
    }

    #[doc(hidden)]
    fn from_byte(_byte: u8) -> Option<Self> {
        None
    }
}

/// Encodes one field into `values`. Called by derived `Model::encode`.
pub fn encode_field<T: FieldKind>(
    values: &mut ValueMap,
    name: &str,
    field: &T,
    encoding: DateEncoding,
) -> Result<()> {
    let value = field
        .to_value(encoding)
        .map_err(|err| err.context(format_args!("field '{}'", name)))?;
    values.insert(name.to_string(), value);
    Ok(())
}

/// Decodes one field from `row`. Called by derived `Model::decode`.
pub fn decode_field<T: FieldKind>(row: &Row, name: &str, encoding: DateEncoding) -> Result<T> {
    T::from_value(row.get(name), encoding)
        .map_err(|err| err.context(format_args!("field '{}'", name)))
}

fn required(value: Option<&Value>) -> Result<&Value> {
    match value {
        None | Some(Value::Null) => Err(RequestError::decoding("missing value")),
        Some(value) => Ok(value),
    }
}

fn mismatch(expected: &str, actual: &Value) -> RequestError {
    RequestError::decoding(format!(
        "expected {}, got {}",
        expected,
        actual.type_name()
    ))
}

macro_rules! integer_field_kind {
    ($($ty:ty => $declared:ident),* $(,)?) => {
        $(
            impl FieldKind for $ty {
                fn declared_type() -> DeclaredType {
                    DeclaredType::$declared
                }

                fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
                    encode_integer(*self)
                }

                fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
                    decode_integer(required(value)?, stringify!($ty))
                }
            }
        )*
    };
}

fn encode_integer<T>(value: T) -> Result<Value>
where
    T: Copy + fmt::Display,
    i64: TryFrom<T>,
{
    i64::try_from(value).map(Value::Integer).map_err(|_| {
        RequestError::encoding(format!("{} does not fit in a 64-bit integer", value))
    })
}

fn decode_integer<T: TryFrom<i64>>(value: &Value, type_name: &str) -> Result<T> {
    let raw = match value {
        Value::Integer(i) => *i,
        Value::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|err| RequestError::decoding(format!("'{}' is not an integer: {}", text, err)))?,
        other => return Err(mismatch(type_name, other)),
    };
    T::try_from(raw)
        .map_err(|_| RequestError::decoding(format!("{} is out of range for {}", raw, type_name)))
}

integer_field_kind! {
    i8 => Int16,
    i16 => Int16,
    u16 => Int32,
    i32 => Int32,
    u32 => Int64,
    i64 => Int64,
    u64 => Int64,
    isize => Int64,
    usize => Int64,
}

impl FieldKind for u8 {
    fn declared_type() -> DeclaredType {
        DeclaredType::Int16
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        Ok(Value::Integer(*self as i64))
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        decode_integer(required(value)?, "u8")
    }

    fn is_byte() -> bool {
        true
    }

    fn as_byte(&self) -> Option<u8> {
        Some(*self)
    }

    fn from_byte(byte: u8) -> Option<Self> {
        Some(byte)
    }
}

fn decode_float(value: &Value, type_name: &str) -> Result<f64> {
    match value {
        Value::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|err| RequestError::decoding(format!("'{}' is not a number: {}", text, err))),
        other => other.as_f64().ok_or_else(|| mismatch(type_name, other)),
    }
}

impl FieldKind for f32 {
    fn declared_type() -> DeclaredType {
        DeclaredType::Float
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        Ok(Value::Float(*self as f64))
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        decode_float(required(value)?, "f32").map(|f| f as f32)
    }
}

impl FieldKind for f64 {
    fn declared_type() -> DeclaredType {
        DeclaredType::Double
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        Ok(Value::Float(*self))
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        decode_float(required(value)?, "f64")
    }
}

impl FieldKind for String {
    fn declared_type() -> DeclaredType {
        DeclaredType::String
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        Ok(Value::Text(self.clone()))
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        match required(value)? {
            Value::Text(text) => Ok(text.clone()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl FieldKind for bool {
    fn declared_type() -> DeclaredType {
        DeclaredType::Bool
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        Ok(Value::Boolean(*self))
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        match required(value)? {
            Value::Boolean(b) => Ok(*b),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            Value::Text(text) if text.eq_ignore_ascii_case("true") => Ok(true),
            Value::Text(text) if text.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FieldKind for Uuid {
    fn declared_type() -> DeclaredType {
        DeclaredType::Uuid
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        Ok(Value::Uuid(*self))
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        match required(value)? {
            Value::Uuid(uuid) => Ok(*uuid),
            Value::Text(text) => Uuid::parse_str(text.trim())
                .map_err(|err| RequestError::decoding(format!("'{}' is not a UUID: {}", text, err))),
            other => Err(mismatch("Uuid", other)),
        }
    }
}

impl FieldKind for DateTime<Utc> {
    fn declared_type() -> DeclaredType {
        DeclaredType::DateTime
    }

    fn to_value(&self, encoding: DateEncoding) -> Result<Value> {
        let value = match encoding {
            DateEncoding::Double => Value::Float(
                self.timestamp() as f64 + f64::from(self.timestamp_subsec_nanos()) / 1e9,
            ),
            DateEncoding::Timestamp => Value::Timestamp(self.naive_utc()),
            DateEncoding::Date => Value::Date(self.date_naive()),
            DateEncoding::Time => Value::Time(self.time()),
        };
        Ok(value)
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        match required(value)? {
            Value::Float(seconds) => datetime_from_seconds(*seconds),
            Value::Integer(seconds) => datetime_from_seconds(*seconds as f64),
            Value::Timestamp(ts) => Ok(ts.and_utc()),
            Value::Date(date) => date
                .and_hms_opt(0, 0, 0)
                .map(|ts| ts.and_utc())
                .ok_or_else(|| RequestError::decoding(format!("invalid date {}", date))),
            Value::Time(time) => Ok(NaiveDate::default().and_time(*time).and_utc()),
            Value::Text(text) => parse_datetime_text(text),
            other => Err(mismatch("DateTime", other)),
        }
    }
}

fn datetime_from_seconds(seconds: f64) -> Result<DateTime<Utc>> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        .ok_or_else(|| RequestError::decoding(format!("{} is not a valid epoch time", seconds)))
}

fn parse_datetime_text(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ts) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ts.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts.and_utc());
        }
    }
    if let Ok(time) = chrono::NaiveTime::parse_from_str(text, "%H:%M:%S%.f") {
        return Ok(NaiveDate::default().and_time(time).and_utc());
    }
    Err(RequestError::decoding(format!("'{}' is not a date", text)))
}

impl FieldKind for http::Uri {
    fn declared_type() -> DeclaredType {
        DeclaredType::Url
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        Ok(Value::Text(self.to_string()))
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        match required(value)? {
            Value::Text(text) => text
                .parse::<http::Uri>()
                .map_err(|err| RequestError::decoding(format!("'{}' is not a URL: {}", text, err))),
            other => Err(mismatch("Url", other)),
        }
    }
}

impl<T: FieldKind> FieldKind for Option<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::Optional(Box::new(T::declared_type()))
    }

    fn to_value(&self, encoding: DateEncoding) -> Result<Value> {
        match self {
            Some(value) => value.to_value(encoding),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Option<&Value>, encoding: DateEncoding) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(Some(value), encoding).map(Some),
        }
    }
}

/// `Vec<u8>` is a byte array persisted as lowercase hex text; any other
/// element type is a collection, which cannot be persisted.
impl<T: FieldKind> FieldKind for Vec<T> {
    fn declared_type() -> DeclaredType {
        if T::is_byte() {
            DeclaredType::Bytes
        } else {
            DeclaredType::Collection("Vec")
        }
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        if !T::is_byte() {
            return Err(RequestError::encoding("arrays or sets are not supported"));
        }
        let bytes = self.iter().filter_map(T::as_byte).collect::<Vec<_>>();
        Ok(Value::Text(encode_hex(&bytes)))
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        if !T::is_byte() {
            return Err(RequestError::decoding("arrays or sets are not supported"));
        }
        match required(value)? {
            Value::Text(text) => Ok(decode_hex(text)?
                .into_iter()
                .filter_map(T::from_byte)
                .collect()),
            other => Err(mismatch("Bytes", other)),
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    if !text.is_ascii() || text.len() % 2 != 0 {
        return Err(RequestError::decoding(format!("'{}' is not hex encoded", text)));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|err| RequestError::decoding(format!("'{}' is not hex encoded: {}", text, err)))
        })
        .collect()
}

macro_rules! composite_field_kind {
    ($($ty:ident),* $(,)?) => {
        $(
            impl<K, V> FieldKind for $ty<K, V> {
                fn declared_type() -> DeclaredType {
                    DeclaredType::Composite(stringify!($ty))
                }

                fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
                    Err(RequestError::encoding("nested structs or dictionaries are not supported"))
                }

                fn from_value(_value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
                    Err(RequestError::decoding("nested structs or dictionaries are not supported"))
                }
            }
        )*
    };
}

composite_field_kind!(HashMap, BTreeMap);

impl FieldKind for serde_json::Value {
    fn declared_type() -> DeclaredType {
        DeclaredType::Composite("serde_json::Value")
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        Err(RequestError::encoding("nested structs or dictionaries are not supported"))
    }

    fn from_value(_value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        Err(RequestError::decoding("nested structs or dictionaries are not supported"))
    }
}

/// A reference to another entity, persisted as a foreign key to its identity.
///
/// The referenced entity's table must be created first.
pub struct Ref<M> {
    id: i64,
    model: PhantomData<fn() -> M>,
}

impl<M> Ref<M> {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            model: PhantomData,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

impl<M: Model> Ref<M> {
    /// Builds a reference to a saved entity.
    pub fn to(model: &M) -> Result<Self> {
        model.model_id().map(Self::new).ok_or_else(|| {
            RequestError::identifier(format!(
                "cannot reference an unsaved {}",
                M::TYPE_NAME
            ))
        })
    }
}

impl<M> Clone for Ref<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Ref<M> {}

impl<M> PartialEq for Ref<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<M> Eq for Ref<M> {}

impl<M> fmt::Debug for Ref<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&self.id).finish()
    }
}

impl<M: Model> FieldKind for Ref<M> {
    fn declared_type() -> DeclaredType {
        DeclaredType::Entity(M::TYPE_NAME)
    }

    fn to_value(&self, _encoding: DateEncoding) -> Result<Value> {
        Ok(Value::Integer(self.id))
    }

    fn from_value(value: Option<&Value>, _encoding: DateEncoding) -> Result<Self> {
        let value = required(value)?;
        value
            .parse_identifier()
            .map(Self::new)
            .ok_or_else(|| mismatch("entity identifier", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use chrono::TimeZone;

    #[test]
    fn optional_fields_wrap_their_inner_type() {
        assert_eq!(
            <Option<i64>>::declared_type(),
            DeclaredType::Optional(Box::new(DeclaredType::Int64))
        );
        assert_eq!(<Option<String>>::from_value(None, DateEncoding::Double).unwrap(), None);
        assert_eq!(
            <Option<String>>::from_value(Some(&Value::Null), DateEncoding::Double).unwrap(),
            None
        );
    }

    #[test]
    fn byte_vectors_are_hex_text_and_other_vectors_are_collections() {
        assert_eq!(<Vec<u8>>::declared_type(), DeclaredType::Bytes);
        assert_eq!(<Vec<String>>::declared_type(), DeclaredType::Collection("Vec"));

        let bytes = vec![0u8, 15, 255];
        let encoded = bytes.to_value(DateEncoding::Double).unwrap();
        assert_eq!(encoded, Value::Text("000fff".into()));
        let decoded = <Vec<u8>>::from_value(Some(&encoded), DateEncoding::Double).unwrap();
        assert_eq!(decoded, bytes);

        let err = vec!["a".to_string()].to_value(DateEncoding::Double).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DatabaseEncodingError);
    }

    #[test]
    fn dates_follow_the_encoding_policy() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        assert_eq!(
            at.to_value(DateEncoding::Double).unwrap(),
            Value::Float(at.timestamp() as f64)
        );
        assert_eq!(
            at.to_value(DateEncoding::Timestamp).unwrap(),
            Value::Timestamp(at.naive_utc())
        );
        assert_eq!(at.to_value(DateEncoding::Date).unwrap(), Value::Date(at.date_naive()));
        assert_eq!(at.to_value(DateEncoding::Time).unwrap(), Value::Time(at.time()));

        let back = <DateTime<Utc>>::from_value(
            Some(&Value::Float(at.timestamp() as f64)),
            DateEncoding::Double,
        )
        .unwrap();
        assert_eq!(back, at);

        let parsed = <DateTime<Utc>>::from_value(
            Some(&Value::Text("2024-03-01T12:30:00Z".into())),
            DateEncoding::Timestamp,
        )
        .unwrap();
        assert_eq!(parsed, at);
    }

    #[test]
    fn required_fields_reject_null() {
        let err = String::from_value(Some(&Value::Null), DateEncoding::Double).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DatabaseDecodingError);
    }

    #[test]
    fn integers_check_their_range() {
        let err = u8::from_value(Some(&Value::Integer(300)), DateEncoding::Double).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DatabaseDecodingError);

        let err = u64::MAX.to_value(DateEncoding::Double).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DatabaseEncodingError);

        assert_eq!(
            i32::from_value(Some(&Value::Text("38".into())), DateEncoding::Double).unwrap(),
            38
        );
    }

    #[test]
    fn maps_are_composites() {
        assert_eq!(
            <HashMap<String, i64>>::declared_type(),
            DeclaredType::Composite("HashMap")
        );
    }

    #[test]
    fn decode_field_names_the_failing_field() {
        let row = Row::from([("age".to_string(), Value::Text("old".into()))]);
        let err = decode_field::<i64>(&row, "age", DateEncoding::Double).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DatabaseDecodingError);
        assert!(err.reason().unwrap().starts_with("field 'age'"));
    }
}
