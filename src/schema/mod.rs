pub mod cache;

pub use cache::{SchemaCache, SchemaEntry};

use crate::core::{DateEncoding, RequestError, Result, SqlType};
use crate::introspect::{FieldDescriptor, TypeInfo};
use crate::model::DeclaredType;
use serde::Serialize;

/// Table name for an entity type: the type name with an "s" appended,
/// unless it already ends in "s".
pub fn table_name_for(type_name: &str) -> String {
    if type_name.ends_with('s') {
        type_name.to_string()
    } else {
        format!("{}s", type_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub local_column: String,
    pub target_table: String,
    pub target_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null: false,
            primary_key: false,
            auto_increment: false,
            foreign_key: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Marks the column as the auto-increment primary key.
    pub fn identity(mut self) -> Self {
        self.not_null = true;
        self.primary_key = true;
        self.auto_increment = true;
        self
    }

    pub fn references(mut self, target_table: impl Into<String>, target_column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            local_column: self.name.clone(),
            target_table: target_table.into(),
            target_column: target_column.into(),
        });
        self
    }

    pub fn is_identity(&self) -> bool {
        self.primary_key && self.auto_increment
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        let foreign_keys = columns
            .iter()
            .filter_map(|column| column.foreign_key.clone())
            .collect();
        Self {
            table_name: table_name.into(),
            columns,
            foreign_keys,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn identity_column(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.is_identity())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}

/// Where a foreign key for a referenced entity points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTarget {
    pub table_name: String,
    pub identity_column: String,
}

/// Derives the table schema for an introspected entity.
///
/// `resolve` looks up an already derived entity by type name; references to
/// entities it does not know are rejected.
pub fn derive_schema<F>(
    table_name: &str,
    info: &TypeInfo,
    date_encoding: DateEncoding,
    resolve: F,
) -> Result<TableSchema>
where
    F: Fn(&str) -> Option<ReferenceTarget>,
{
    let mut columns = Vec::with_capacity(info.fields.len());

    for field in &info.fields {
        let column = if field.name == info.identity_field {
            identity_column(info, field)?
        } else {
            let column = derive_column(field, date_encoding, &resolve)?;
            if field.is_optional { column } else { column.not_null() }
        };
        columns.push(column);
    }

    if !columns.iter().any(ColumnDefinition::is_identity) {
        return Err(RequestError::table_creation(format!(
            "{} has no identity field named '{}'",
            info.type_name, info.identity_field
        )));
    }

    Ok(TableSchema::new(table_name, columns))
}

fn identity_column(info: &TypeInfo, field: &FieldDescriptor) -> Result<ColumnDefinition> {
    if field.declared_type != DeclaredType::Int64 {
        return Err(RequestError::table_creation(format!(
            "Identity field '{}' of {} must be an optional 64-bit integer, found {}",
            field.name, info.type_name, field.declared_type
        )));
    }
    Ok(ColumnDefinition::new(&field.name, SqlType::BigInt).identity())
}

fn derive_column<F>(
    field: &FieldDescriptor,
    date_encoding: DateEncoding,
    resolve: &F,
) -> Result<ColumnDefinition>
where
    F: Fn(&str) -> Option<ReferenceTarget>,
{
    let sql_type = match &field.declared_type {
        DeclaredType::Int16 => SqlType::SmallInt,
        DeclaredType::Int32 => SqlType::Integer,
        DeclaredType::Int64 => SqlType::BigInt,
        DeclaredType::Float => SqlType::Real,
        DeclaredType::Double => SqlType::Double,
        DeclaredType::String | DeclaredType::Bytes | DeclaredType::Url => SqlType::Text,
        DeclaredType::Bool => SqlType::Boolean,
        DeclaredType::Uuid => SqlType::Uuid,
        DeclaredType::DateTime => date_encoding.sql_type(),
        DeclaredType::Entity(type_name) => {
            let target = resolve(type_name).ok_or_else(|| {
                RequestError::table_creation(format!(
                    "Field '{}' references {}, which has no table yet: create the table for the referenced entity first",
                    field.name, type_name
                ))
            })?;
            return Ok(ColumnDefinition::new(&field.name, SqlType::BigInt)
                .references(target.table_name, target.identity_column));
        }
        DeclaredType::Composite(_) => {
            return Err(RequestError::table_creation(format!(
                "Field '{}': nested structs or dictionaries are not supported",
                field.name
            )));
        }
        DeclaredType::Collection(_) => {
            return Err(RequestError::table_creation(format!(
                "Field '{}': arrays or sets are not supported",
                field.name
            )));
        }
        DeclaredType::Optional(_) => {
            return Err(RequestError::table_creation(format!(
                "Type: {} of field '{}' is not supported",
                field.declared_type, field.name
            )));
        }
    };
    Ok(ColumnDefinition::new(&field.name, sql_type))
}
