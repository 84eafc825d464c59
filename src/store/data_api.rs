use super::DocumentStore;
use crate::config::RemoteStoreConfig;
use crate::error::{PublisherError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// Largest `limit` the Data API accepts for `find`, and also its default.
pub const FIND_PAGE_SIZE: usize = 1000;

/// MongoDB Atlas Data API client.
///
/// Every call is a `POST {endpoint}/action/<name>`; the shared client carries
/// the run's connect and response timeouts.
pub struct DataApiStore {
    client: Client,
    endpoint: String,
    api_key: String,
    data_source: String,
    database: String,
    page_size: usize,
}

impl DataApiStore {
    pub fn new(client: Client, config: &RemoteStoreConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            data_source: config.data_source.clone(),
            database: config.database.clone(),
            page_size: FIND_PAGE_SIZE,
        }
    }

    /// Documents requested per `find` page. Clamped to `1..=FIND_PAGE_SIZE`.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, FIND_PAGE_SIZE);
        self
    }

    async fn action(&self, action: &str, collection: &str, mut body: Value) -> Result<Value> {
        body["dataSource"] = json!(self.data_source);
        body["database"] = json!(self.database);
        body["collection"] = json!(collection);

        debug!("Data API {} on {}", action, collection);
        let response = self
            .client
            .post(format!("{}/action/{}", self.endpoint, action))
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PublisherError::from_response(response).await);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DocumentStore for DataApiStore {
    async fn find_one(&self, collection: &str, filter: Value) -> Result<Option<Value>> {
        let response = self
            .action("findOne", collection, json!({ "filter": filter }))
            .await?;
        Ok(match response.get("document") {
            Some(Value::Null) | None => None,
            Some(doc) => Some(doc.clone()),
        })
    }

    /// Pages through every match in `_id` order until a page comes back short.
    async fn find(
        &self,
        collection: &str,
        filter: Value,
        projection: Option<Value>,
    ) -> Result<Vec<Value>> {
        let mut documents = Vec::new();
        loop {
            let mut body = json!({
                "filter": filter,
                "sort": { "_id": 1 },
                "limit": self.page_size,
                "skip": documents.len(),
            });
            if let Some(projection) = &projection {
                body["projection"] = projection.clone();
            }
            let response = self.action("find", collection, body).await?;
            let page = match response.get("documents") {
                Some(Value::Array(docs)) => docs.clone(),
                _ => return Err(PublisherError::store("find response has no documents array")),
            };

            let short = page.len() < self.page_size;
            documents.extend(page);
            if short {
                return Ok(documents);
            }
            debug!("Read {} documents of {} so far", documents.len(), collection);
        }
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        self.action("insertOne", collection, json!({ "document": document }))
            .await?;
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Value,
        update: Value,
        upsert: bool,
    ) -> Result<()> {
        self.action(
            "updateOne",
            collection,
            json!({ "filter": filter, "update": update, "upsert": upsert }),
        )
        .await?;
        Ok(())
    }

    async fn delete_many(&self, collection: &str, filter: Value) -> Result<u64> {
        let response = self
            .action("deleteMany", collection, json!({ "filter": filter }))
            .await?;
        Ok(response
            .get("deletedCount")
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}
