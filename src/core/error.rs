use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of a [`RequestError`], each with a stable numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Neither an explicit nor a default database was supplied.
    DatabaseNotInitialized,
    /// The schema could not be derived or the table could not be created.
    TableCreationError,
    /// The entity's field list could not be enumerated or classified.
    CodableDecodingError,
    /// A result row could not be decoded into an entity.
    DatabaseDecodingError,
    /// An entity could not be encoded into column values.
    DatabaseEncodingError,
    /// The query could not be built or failed to execute.
    QueryError,
    /// No row (or no value) came back where one was required.
    NotFound,
    /// The derived table lacks a required column.
    InvalidTableDefinition,
    /// The identifier could not be used or constructed.
    IdentifierError,
    InternalError,
    /// A connection could not be retrieved from the database.
    ConnectionFailed,
}

impl ErrorKind {
    pub const fn code(self) -> u16 {
        match self {
            Self::DatabaseNotInitialized => 700,
            Self::TableCreationError => 701,
            Self::CodableDecodingError => 702,
            Self::DatabaseDecodingError => 703,
            Self::DatabaseEncodingError => 704,
            Self::QueryError => 706,
            Self::NotFound => 707,
            Self::InvalidTableDefinition => 708,
            Self::IdentifierError => 709,
            Self::InternalError => 710,
            Self::ConnectionFailed => 711,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let kind = match code {
            700 => Self::DatabaseNotInitialized,
            701 => Self::TableCreationError,
            702 => Self::CodableDecodingError,
            703 => Self::DatabaseDecodingError,
            704 => Self::DatabaseEncodingError,
            706 => Self::QueryError,
            707 => Self::NotFound,
            708 => Self::InvalidTableDefinition,
            709 => Self::IdentifierError,
            710 => Self::InternalError,
            711 => Self::ConnectionFailed,
            _ => return None,
        };
        Some(kind)
    }

    /// Reason attached when the caller does not supply one.
    fn default_reason(self) -> Option<&'static str> {
        match self {
            Self::DatabaseNotInitialized => Some("Database not initialized"),
            Self::ConnectionFailed => Some("Failed to retrieve a connection from the database"),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DatabaseNotInitialized => "database not initialized",
            Self::TableCreationError => "table creation error",
            Self::CodableDecodingError => "type decoding error",
            Self::DatabaseDecodingError => "database decoding error",
            Self::DatabaseEncodingError => "database encoding error",
            Self::QueryError => "query error",
            Self::NotFound => "not found",
            Self::InvalidTableDefinition => "invalid table definition",
            Self::IdentifierError => "identifier error",
            Self::InternalError => "internal error",
            Self::ConnectionFailed => "connection failed",
        };
        write!(f, "{}", name)
    }
}

/// The single error type reported by every schema, query and CRUD operation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} ({code}){detail}", code = .kind.code(), detail = format_reason(.reason))]
pub struct RequestError {
    kind: ErrorKind,
    reason: Option<String>,
}

fn format_reason(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {}", reason),
        None => String::new(),
    }
}

impl RequestError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            reason: kind.default_reason().map(str::to_string),
        }
    }

    pub fn with_reason(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: Some(reason.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Prefixes the reason with `context`, keeping the kind.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.reason = Some(match self.reason {
            Some(reason) => format!("{}: {}", context, reason),
            None => context.to_string(),
        });
        self
    }

    pub fn not_initialized() -> Self {
        Self::new(ErrorKind::DatabaseNotInitialized)
    }

    pub fn table_creation(reason: impl Into<String>) -> Self {
        Self::with_reason(ErrorKind::TableCreationError, reason)
    }

    pub fn codable_decoding(reason: impl Into<String>) -> Self {
        Self::with_reason(ErrorKind::CodableDecodingError, reason)
    }

    pub fn decoding(reason: impl Into<String>) -> Self {
        Self::with_reason(ErrorKind::DatabaseDecodingError, reason)
    }

    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::with_reason(ErrorKind::DatabaseEncodingError, reason)
    }

    pub fn query(reason: impl Into<String>) -> Self {
        Self::with_reason(ErrorKind::QueryError, reason)
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::with_reason(ErrorKind::NotFound, reason)
    }

    pub fn invalid_table(reason: impl Into<String>) -> Self {
        Self::with_reason(ErrorKind::InvalidTableDefinition, reason)
    }

    pub fn identifier(reason: impl Into<String>) -> Self {
        Self::with_reason(ErrorKind::IdentifierError, reason)
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::with_reason(ErrorKind::InternalError, reason)
    }

    pub fn connection_failed() -> Self {
        Self::new(ErrorKind::ConnectionFailed)
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;

impl<T> From<std::sync::PoisonError<T>> for RequestError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::internal(err.to_string())
    }
}
