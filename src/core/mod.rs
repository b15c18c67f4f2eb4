pub mod error;
pub mod types;
pub mod value;

pub use error::{ErrorKind, RequestError, Result};
pub use types::{DateEncoding, Row, SqlType, ValueMap};
pub use value::Value;
