use super::{ReferenceTarget, TableSchema, derive_schema};
use crate::core::{DateEncoding, Result};
use crate::introspect::{TypeInfo, introspect};
use crate::model::Model;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{Level, event};

/// Cached introspection result and derived schema for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub info: TypeInfo,
    pub schema: TableSchema,
}

/// Memoizes derived schemas per entity type name.
///
/// Lookups share a read lock. A miss takes the write lock, checks again for
/// an entry populated in the meantime, then derives and inserts while still
/// holding it, so each type is derived at most once per cache. Entries are
/// never replaced once inserted.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<SchemaEntry>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_schema<M: Model>(&self, table_name: &str, date_encoding: DateEncoding) -> Result<TableSchema> {
        Ok(self.get_entry::<M>(table_name, date_encoding)?.schema.clone())
    }

    pub fn get_entry<M: Model>(
        &self,
        table_name: &str,
        date_encoding: DateEncoding,
    ) -> Result<Arc<SchemaEntry>> {
        if let Some(entry) = self.lookup(M::TYPE_NAME)? {
            return Ok(entry);
        }

        let mut entries = self.entries.write()?;
        if let Some(entry) = entries.get(M::TYPE_NAME) {
            return Ok(Arc::clone(entry));
        }

        let info = introspect::<M>()?;
        let schema = derive_schema(table_name, &info, date_encoding, |type_name| {
            reference_target(&entries, type_name)
        })?;

        event!(
            Level::DEBUG,
            entity = M::TYPE_NAME,
            table = %schema.table_name,
            columns = schema.columns.len(),
            "schema derived"
        );

        let entry = Arc::new(SchemaEntry { info, schema });
        entries.insert(M::TYPE_NAME.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    pub fn lookup(&self, type_name: &str) -> Result<Option<Arc<SchemaEntry>>> {
        let entries = self.entries.read()?;
        Ok(entries.get(type_name).cloned())
    }

    pub fn contains(&self, type_name: &str) -> Result<bool> {
        Ok(self.entries.read()?.contains_key(type_name))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<()> {
        self.entries.write()?.clear();
        Ok(())
    }
}

fn reference_target(
    entries: &HashMap<String, Arc<SchemaEntry>>,
    type_name: &str,
) -> Option<ReferenceTarget> {
    let entry = entries.get(type_name)?;
    let identity = entry.schema.identity_column()?;
    Some(ReferenceTarget {
        table_name: entry.schema.table_name.clone(),
        identity_column: identity.name.clone(),
    })
}
