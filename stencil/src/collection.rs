//! Storage seam.
//!
//! The core never performs I/O itself. Generated filters, updates and
//! projections are handed to a [`Collection`], implemented here for the
//! `mongodb` driver's untyped collection.

use crate::{
    Document, Result, Schema,
    query::{Filter, Update},
    schema::Index,
};
use futures_util::{FutureExt, TryStreamExt, future::BoxFuture};
use mongodb::bson::{Bson, Document as BsonDocument};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<BsonDocument>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub sort: Option<BsonDocument>,
}

pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    fn find(
        &self,
        filter: BsonDocument,
        options: FindOptions,
    ) -> BoxFuture<'_, Result<Vec<BsonDocument>>>;

    fn find_one(
        &self,
        filter: BsonDocument,
        projection: Option<BsonDocument>,
    ) -> BoxFuture<'_, Result<Option<BsonDocument>>>;

    /// Returns the identifier of the inserted document.
    fn insert_one(&self, document: BsonDocument) -> BoxFuture<'_, Result<Bson>>;

    /// Returns the number of modified documents.
    fn update_one(&self, filter: BsonDocument, update: BsonDocument) -> BoxFuture<'_, Result<u64>>;

    fn update_many(&self, filter: BsonDocument, update: BsonDocument) -> BoxFuture<'_, Result<u64>>;

    /// Returns the number of deleted documents.
    fn delete_one(&self, filter: BsonDocument) -> BoxFuture<'_, Result<u64>>;

    fn delete_many(&self, filter: BsonDocument) -> BoxFuture<'_, Result<u64>>;

    fn create_index(&self, index: Index) -> BoxFuture<'_, Result<()>>;
}

impl Collection for mongodb::Collection<BsonDocument> {
    fn name(&self) -> &str {
        mongodb::Collection::name(self)
    }

    fn find(
        &self,
        filter: BsonDocument,
        options: FindOptions,
    ) -> BoxFuture<'_, Result<Vec<BsonDocument>>> {
        async move {
            let mut query = mongodb::Collection::find(self, filter);

            if let Some(projection) = options.projection {
                query = query.projection(projection);
            }

            if let Some(skip) = options.skip {
                query = query.skip(skip);
            }

            if let Some(limit) = options.limit {
                query = query.limit(limit);
            }

            if let Some(sort) = options.sort {
                query = query.sort(sort);
            }

            let documents = query.await?.try_collect().await?;

            Ok(documents)
        }
        .boxed()
    }

    fn find_one(
        &self,
        filter: BsonDocument,
        projection: Option<BsonDocument>,
    ) -> BoxFuture<'_, Result<Option<BsonDocument>>> {
        async move {
            let mut query = mongodb::Collection::find_one(self, filter);
            if let Some(projection) = projection {
                query = query.projection(projection);
            }

            let document = query.await?;

            Ok(document)
        }
        .boxed()
    }

    fn insert_one(&self, document: BsonDocument) -> BoxFuture<'_, Result<Bson>> {
        async move {
            let result = mongodb::Collection::insert_one(self, document).await?;

            Ok(result.inserted_id)
        }
        .boxed()
    }

    fn update_one(&self, filter: BsonDocument, update: BsonDocument) -> BoxFuture<'_, Result<u64>> {
        async move {
            let result = mongodb::Collection::update_one(self, filter, update).await?;

            Ok(result.modified_count)
        }
        .boxed()
    }

    fn update_many(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> BoxFuture<'_, Result<u64>> {
        async move {
            let result = mongodb::Collection::update_many(self, filter, update).await?;

            Ok(result.modified_count)
        }
        .boxed()
    }

    fn delete_one(&self, filter: BsonDocument) -> BoxFuture<'_, Result<u64>> {
        async move {
            let result = mongodb::Collection::delete_one(self, filter).await?;

            Ok(result.deleted_count)
        }
        .boxed()
    }

    fn delete_many(&self, filter: BsonDocument) -> BoxFuture<'_, Result<u64>> {
        async move {
            let result = mongodb::Collection::delete_many(self, filter).await?;

            Ok(result.deleted_count)
        }
        .boxed()
    }

    fn create_index(&self, index: Index) -> BoxFuture<'_, Result<()>> {
        async move {
            mongodb::Collection::create_index(self, index.to_model()).await?;

            Ok(())
        }
        .boxed()
    }
}

/// A collection paired with the schema of the documents it stores.
///
/// Reads wrap stored data in [`Document`]s without casting; writes validate
/// required fields first.
#[derive(Debug)]
pub struct Bound<C> {
    schema: Arc<Schema>,
    collection: C,
}

impl<C: Collection> Bound<C> {
    pub fn new(schema: &Arc<Schema>, collection: C) -> Self {
        Self {
            schema: schema.clone(),
            collection,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub async fn find(&self, filter: Filter, options: FindOptions) -> Result<Vec<Document>> {
        debug!(collection = self.collection.name(), filter = ?filter.as_query(), "find");

        let documents = self.collection.find(filter.into_query(), options).await?;

        Ok(documents
            .into_iter()
            .map(|document| Document::from_foreign(&self.schema, document))
            .collect())
    }

    pub async fn find_one(&self, filter: Filter) -> Result<Option<Document>> {
        debug!(collection = self.collection.name(), filter = ?filter.as_query(), "find one");

        let document = self.collection.find_one(filter.into_query(), None).await?;

        Ok(document.map(|document| Document::from_foreign(&self.schema, document)))
    }

    pub async fn insert(&self, document: &Document) -> Result<Bson> {
        document.validate()?;
        debug!(collection = self.collection.name(), id = ?document.id(), "insert");

        self.collection.insert_one(document.to_foreign()).await
    }

    pub async fn update_one(&self, filter: Filter, update: Update) -> Result<u64> {
        debug!(
            collection = self.collection.name(),
            filter = ?filter.as_query(),
            update = ?update.as_update(),
            "update one"
        );

        self.collection
            .update_one(filter.into_query(), update.into_update())
            .await
    }

    pub async fn update_many(&self, filter: Filter, update: Update) -> Result<u64> {
        debug!(
            collection = self.collection.name(),
            filter = ?filter.as_query(),
            update = ?update.as_update(),
            "update many"
        );

        self.collection
            .update_many(filter.into_query(), update.into_update())
            .await
    }

    pub async fn delete_one(&self, filter: Filter) -> Result<u64> {
        debug!(collection = self.collection.name(), filter = ?filter.as_query(), "delete one");

        self.collection.delete_one(filter.into_query()).await
    }

    pub async fn delete_many(&self, filter: Filter) -> Result<u64> {
        debug!(collection = self.collection.name(), filter = ?filter.as_query(), "delete many");

        self.collection.delete_many(filter.into_query()).await
    }

    /// Creates every index the schema declares.
    pub async fn create_indexes(&self) -> Result<()> {
        for index in self.schema.indexes() {
            debug!(collection = self.collection.name(), keys = ?index.keys, "create index");
            self.collection.create_index(index.clone()).await?;
        }

        Ok(())
    }
}
