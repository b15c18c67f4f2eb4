// ============================================================================
// modelkit Library
// ============================================================================

// Lets `#[derive(Model)]` expand to `::modelkit::...` inside this crate too.
extern crate self as modelkit;

pub mod core;
pub mod model;
pub mod introspect;
pub mod schema;
pub mod query;
pub mod statement;
pub mod connection;
pub mod orm;
pub mod testing;

// Re-export main types for convenience
pub use core::{DateEncoding, ErrorKind, RequestError, Result, Row, SqlType, Value, ValueMap};
pub use model::{DeclaredType, EntityShape, FieldKind, FieldShape, Model, Ref};
pub use modelkit_derive::Model;
pub use introspect::{FieldDescriptor, TypeInfo, introspect};
pub use schema::{ColumnDefinition, ForeignKey, SchemaCache, SchemaEntry, TableSchema, table_name_for};
pub use query::{
    Comparison, Direction, Filter, Operator, OrderBy, Pagination, Predicate, QueryParameters,
    QueryValue, TranslatedQuery,
};
pub use statement::{PlaceholderStyle, Statement};

// Re-export connection API
pub use connection::{
    Connection,
    ConnectionProvider,
    Database,
    ExecOutcome,
    ExecutorError,
    config::OrmConfig,
};

pub use orm::{ModelExt, Orm};
