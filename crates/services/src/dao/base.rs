use bson::{Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Collection, Database,
    error::{ErrorKind, WriteFailure},
    options::FindOptions,
    results::UpdateResult,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{ChatError, ChatResult};

/// Thin typed wrapper over a MongoDB collection.
pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(db: &Database, name: &str) -> Self {
        Self {
            collection: db.collection::<T>(name),
        }
    }

    pub fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    pub async fn insert_one(&self, item: &T) -> ChatResult<ObjectId> {
        let result = self.collection.insert_one(item).await?;
        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ChatError::Storage("inserted _id is not an ObjectId".to_string()))
    }

    pub async fn find_one(&self, filter: Document) -> ChatResult<Option<T>> {
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
        projection: Option<Document>,
    ) -> ChatResult<Vec<T>> {
        let opts = FindOptions::builder()
            .sort(sort)
            .projection(projection)
            .build();
        let cursor = self.collection.find(filter).with_options(opts).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> ChatResult<UpdateResult> {
        Ok(self.collection.update_one(filter, update).await?)
    }

    pub async fn exists(&self, id: ObjectId) -> ChatResult<bool> {
        let count = self
            .collection
            .count_documents(doc! { "_id": id })
            .await?;
        Ok(count > 0)
    }
}

/// True when the driver reports a unique index violation (E11000).
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref we)) => we.code == 11000,
        ErrorKind::Command(ref ce) => ce.code == 11000,
        _ => false,
    }
}
