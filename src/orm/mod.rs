//! CRUD orchestration over derived schemas.
//!
//! Every operation resolves its database first (an explicit handle, else the
//! default one), then derives or looks up the schema and builds its
//! statement synchronously, and only then awaits the executor.

pub mod ext;

pub use ext::ModelExt;

use crate::connection::config::OrmConfig;
use crate::connection::{Database, ExecOutcome};
use crate::core::{RequestError, Result, Row, Value};
use crate::model::Model;
use crate::query::{Comparison, Filter, QueryParameters, translate, translate_filter};
use crate::schema::{SchemaCache, TableSchema, table_name_for};
use crate::statement::Statement;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Entry point for schema and CRUD operations.
///
/// Cloning is cheap; clones share the schema cache.
#[derive(Debug, Clone)]
pub struct Orm {
    config: OrmConfig,
    default_db: Option<Database>,
    cache: Arc<SchemaCache>,
}

impl Orm {
    pub fn new(config: OrmConfig) -> Self {
        Self {
            config,
            default_db: None,
            cache: Arc::new(SchemaCache::new()),
        }
    }

    pub fn with_default_database(mut self, db: Database) -> Self {
        self.default_db = Some(db);
        self
    }

    /// Shares `cache` with other orchestrators.
    pub fn with_schema_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn set_default_database(&mut self, db: Option<Database>) {
        self.default_db = db;
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// Derived schema of `M`, for building custom statements.
    pub fn schema<M: Model>(&self) -> Result<TableSchema> {
        self.cache
            .get_schema::<M>(&table_name_for(M::TYPE_NAME), M::date_encoding())
    }

    pub async fn create_table<M: Model>(&self, using: Option<&Database>) -> Result<bool> {
        let db = self.resolve(using)?;
        let span = info_span!("orm.create_table", entity = M::TYPE_NAME);
        async move {
            let schema = self.schema::<M>()?;
            self.execute(db, &Statement::CreateTable(schema), &[]).await?;
            event!(Level::INFO, "table created");
            Ok(true)
        }
        .instrument(span)
        .await
    }

    pub async fn drop_table<M: Model>(&self, using: Option<&Database>) -> Result<bool> {
        let db = self.resolve(using)?;
        let table = table_name_for(M::TYPE_NAME);
        let span = info_span!("orm.drop_table", entity = M::TYPE_NAME, table = %table);
        async move {
            self.execute(db, &Statement::DropTable { table }, &[]).await?;
            event!(Level::INFO, "table dropped");
            Ok(true)
        }
        .instrument(span)
        .await
    }

    /// Blocking form of [`Orm::create_table`] for callers outside an async context.
    ///
    /// Drives the future on the current thread, so it must not be called from
    /// inside an async runtime worker.
    pub fn create_table_blocking<M: Model>(&self, using: Option<&Database>) -> Result<bool> {
        futures::executor::block_on(self.create_table::<M>(using))
    }

    /// Blocking form of [`Orm::drop_table`].
    pub fn drop_table_blocking<M: Model>(&self, using: Option<&Database>) -> Result<bool> {
        futures::executor::block_on(self.drop_table::<M>(using))
    }

    /// Inserts `model` and returns a copy carrying the new identity.
    pub async fn save<M: Model>(&self, model: &M, using: Option<&Database>) -> Result<M> {
        let db = self.resolve(using)?;
        let span = info_span!("orm.save", entity = M::TYPE_NAME);
        async move {
            let schema = self.schema::<M>()?;
            let identity = schema
                .identity_column()
                .ok_or_else(|| RequestError::invalid_table("Could not find id column"))?;
            let values = model.encode(M::date_encoding())?;

            let mut columns = Vec::new();
            let mut parameters = Vec::new();
            for column in &schema.columns {
                if column.auto_increment {
                    continue;
                }
                match values.get(&column.name) {
                    Some(value) if !value.is_null() => {
                        columns.push(column.name.clone());
                        parameters.push(value.clone());
                    }
                    _ => {}
                }
            }

            let statement = Statement::Insert {
                table: schema.table_name.clone(),
                columns,
                returning: Some(identity.name.clone()),
            };
            let rows = self.execute(db, &statement, &parameters).await?.into_rows();

            let id = returned_identity(rows.first(), &identity.name)?;
            let mut saved = model.clone();
            saved.set_model_id(Some(id));
            event!(Level::DEBUG, id, "entity saved");
            Ok(saved)
        }
        .instrument(span)
        .await
    }

    /// Rewrites every column of the stored row identified by `model`'s identity.
    pub async fn update<M: Model>(&self, model: &M, using: Option<&Database>) -> Result<M> {
        let db = self.resolve(using)?;
        let span = info_span!("orm.update", entity = M::TYPE_NAME, id = ?model.model_id());
        async move {
            let schema = self.schema::<M>()?;
            let identity = schema
                .identity_column()
                .ok_or_else(|| RequestError::invalid_table("Could not find id column"))?;
            let id = model.model_id().ok_or_else(|| {
                RequestError::identifier(format!("Cannot update an unsaved {}", M::TYPE_NAME))
            })?;
            let values = model.encode(M::date_encoding())?;

            let mut columns = Vec::new();
            let mut parameters = Vec::new();
            for column in schema.columns.iter().filter(|c| !c.auto_increment) {
                columns.push(column.name.clone());
                parameters.push(values.get(&column.name).cloned().unwrap_or(Value::Null));
            }
            parameters.push(Value::Integer(id));

            let statement = Statement::Update {
                table: schema.table_name.clone(),
                filter: Filter::predicate(&identity.name, Comparison::Equal, parameters.len()),
                columns,
            };
            self.execute(db, &statement, &parameters).await?;
            event!(Level::DEBUG, "entity updated");
            Ok(model.clone())
        }
        .instrument(span)
        .await
    }

    pub async fn delete<M: Model>(&self, model: &M, using: Option<&Database>) -> Result<()> {
        let db = self.resolve(using)?;
        let span = info_span!("orm.delete", entity = M::TYPE_NAME, id = ?model.model_id());
        async move {
            let schema = self.schema::<M>()?;
            let identity = schema
                .identity_column()
                .ok_or_else(|| RequestError::not_found("Could not find id column"))?;
            let id = model.model_id().ok_or_else(|| {
                RequestError::identifier(format!("Cannot delete an unsaved {}", M::TYPE_NAME))
            })?;

            let statement = Statement::Delete {
                table: schema.table_name.clone(),
                filter: Some(Filter::predicate(&identity.name, Comparison::Equal, 1)),
            };
            self.execute(db, &statement, &[Value::Integer(id)]).await?;
            event!(Level::DEBUG, "entity deleted");
            Ok(())
        }
        .instrument(span)
        .await
    }

    pub async fn delete_all<M: Model>(&self, using: Option<&Database>) -> Result<()> {
        let db = self.resolve(using)?;
        let span = info_span!("orm.delete_all", entity = M::TYPE_NAME);
        async move {
            let schema = self.schema::<M>()?;
            let statement = Statement::Delete {
                table: schema.table_name.clone(),
                filter: None,
            };
            self.execute(db, &statement, &[]).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    pub async fn delete_all_matching<M: Model>(
        &self,
        params: &QueryParameters,
        using: Option<&Database>,
    ) -> Result<()> {
        let db = self.resolve(using)?;
        let span = info_span!("orm.delete_all_matching", entity = M::TYPE_NAME, parameters = params.len());
        async move {
            let schema = self.schema::<M>()?;
            let (filter, parameters) = translate_filter(params, &schema)?;
            let statement = Statement::Delete {
                table: schema.table_name.clone(),
                filter: Some(filter),
            };
            self.execute(db, &statement, &parameters).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    pub async fn find<M: Model>(&self, id: i64, using: Option<&Database>) -> Result<M> {
        let db = self.resolve(using)?;
        let span = info_span!("orm.find", entity = M::TYPE_NAME, id);
        async move {
            let schema = self.schema::<M>()?;
            let identity = schema
                .identity_column()
                .ok_or_else(|| RequestError::invalid_table("Could not find id column"))?;

            let statement = Statement::Select {
                table: schema.table_name.clone(),
                filter: Some(Filter::predicate(&identity.name, Comparison::Equal, 1)),
                order: Vec::new(),
                page: None,
            };
            let rows = self.execute(db, &statement, &[Value::Integer(id)]).await?.into_rows();
            let row = rows.first().ok_or_else(|| {
                RequestError::not_found(format!("No {} with {} {}", M::TYPE_NAME, identity.name, id))
            })?;
            M::decode(row, M::date_encoding())
        }
        .instrument(span)
        .await
    }

    pub async fn find_all<M: Model>(&self, using: Option<&Database>) -> Result<Vec<M>> {
        let db = self.resolve(using)?;
        let span = info_span!("orm.find_all", entity = M::TYPE_NAME);
        async move {
            let schema = self.schema::<M>()?;
            let statement = Statement::Select {
                table: schema.table_name.clone(),
                filter: None,
                order: Vec::new(),
                page: None,
            };
            let outcome = self.execute(db, &statement, &[]).await?;
            decode_rows(outcome)
        }
        .instrument(span)
        .await
    }

    pub async fn find_all_matching<M: Model>(
        &self,
        params: &QueryParameters,
        using: Option<&Database>,
    ) -> Result<Vec<M>> {
        let db = self.resolve(using)?;
        let span = info_span!("orm.find_all_matching", entity = M::TYPE_NAME, parameters = params.len());
        async move {
            let schema = self.schema::<M>()?;
            let translated = translate(params, &schema, self.config.max_page_size)?;
            let statement = Statement::Select {
                table: schema.table_name.clone(),
                filter: translated.filter,
                order: translated.order,
                page: translated.page,
            };
            let outcome = self.execute(db, &statement, &translated.parameters).await?;
            decode_rows(outcome)
        }
        .instrument(span)
        .await
    }

    fn resolve<'a>(&'a self, using: Option<&'a Database>) -> Result<&'a Database> {
        using
            .or(self.default_db.as_ref())
            .ok_or_else(RequestError::not_initialized)
    }

    async fn execute(&self, db: &Database, statement: &Statement, parameters: &[Value]) -> Result<ExecOutcome> {
        if self.config.log_statements {
            event!(
                Level::DEBUG,
                sql = %statement.to_sql(self.config.placeholder_style),
                parameters = parameters.len(),
                "executing statement"
            );
        }

        let connection = db.connection().await?;
        connection.execute(statement, parameters).await.map_err(|err| {
            let err = RequestError::from(err);
            event!(
                Level::ERROR,
                error = %err,
                statement = statement.kind(),
                table = statement.table(),
                "statement failed"
            );
            err
        })
    }
}

impl Default for Orm {
    fn default() -> Self {
        Self::new(OrmConfig::default())
    }
}

fn returned_identity(row: Option<&Row>, column: &str) -> Result<i64> {
    let row = row.ok_or_else(|| RequestError::not_found("Could not retrieve value for Query"))?;
    let value = row
        .get(column)
        .ok_or_else(|| RequestError::not_found("Could not find return id"))?;
    if value.is_null() {
        return Err(RequestError::not_found("Return id is nil"));
    }
    value
        .parse_identifier()
        .ok_or_else(|| RequestError::internal("Unable to convert identifier"))
}

fn decode_rows<M: Model>(outcome: ExecOutcome) -> Result<Vec<M>> {
    outcome
        .into_rows()
        .iter()
        .map(|row| M::decode(row, M::date_encoding()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::testing::row;

    #[test]
    fn returned_identity_requires_a_usable_value() {
        let err = returned_identity(None, "id").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let empty = Row::new();
        let err = returned_identity(Some(&empty), "id").unwrap_err();
        assert_eq!(err.reason(), Some("Could not find return id"));

        let null = row([("id", Value::Null)]);
        let err = returned_identity(Some(&null), "id").unwrap_err();
        assert_eq!(err.reason(), Some("Return id is nil"));

        let garbage = row([("id", "seven")]);
        let err = returned_identity(Some(&garbage), "id").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);

        let textual = row([("id", "42")]);
        assert_eq!(returned_identity(Some(&textual), "id").unwrap(), 42);
    }
}
