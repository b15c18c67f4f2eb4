use super::Orm;
use crate::core::Result;
use crate::model::Model;
use crate::query::QueryParameters;
use async_trait::async_trait;

/// Model-level shorthands for the [`Orm`] operations, using its default database.
///
/// ```ignore
/// Person::create_table(&orm).await?;
/// let joe = Person { id: None, name: "Joe".into(), age: 38 }.save(&orm).await?;
/// let found = Person::find(&orm, joe.id.unwrap()).await?;
/// ```
#[async_trait]
pub trait ModelExt: Model {
    async fn create_table(orm: &Orm) -> Result<bool> {
        orm.create_table::<Self>(None).await
    }

    async fn drop_table(orm: &Orm) -> Result<bool> {
        orm.drop_table::<Self>(None).await
    }

    async fn save(&self, orm: &Orm) -> Result<Self> {
        orm.save(self, None).await
    }

    async fn update(&self, orm: &Orm) -> Result<Self> {
        orm.update(self, None).await
    }

    async fn delete(&self, orm: &Orm) -> Result<()> {
        orm.delete(self, None).await
    }

    async fn delete_all(orm: &Orm) -> Result<()> {
        orm.delete_all::<Self>(None).await
    }

    async fn delete_all_matching(orm: &Orm, params: &QueryParameters) -> Result<()> {
        orm.delete_all_matching::<Self>(params, None).await
    }

    async fn find(orm: &Orm, id: i64) -> Result<Self> {
        orm.find::<Self>(id, None).await
    }

    async fn find_all(orm: &Orm) -> Result<Vec<Self>> {
        orm.find_all::<Self>(None).await
    }

    async fn find_all_matching(orm: &Orm, params: &QueryParameters) -> Result<Vec<Self>> {
        orm.find_all_matching::<Self>(params, None).await
    }
}

impl<M: Model> ModelExt for M {}
