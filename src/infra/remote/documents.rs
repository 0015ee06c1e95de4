//! Document-database access.
//!
//! The backend exposes collections over REST: `GET /v1/{collection}/{id}`,
//! `POST /v1/{collection}:query` with equality/range filters, plus create,
//! patch and delete. This module owns the dialect; the per-collection
//! adapters own the DTO ↔ record translation.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::infra::error::RemoteError;

use super::client::BackendClient;

/// A single query filter.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: &'static str,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy)]
pub enum FilterOp {
    Eq,
    Ge,
    Le,
}

impl FilterOp {
    fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "==",
            FilterOp::Ge => ">=",
            FilterOp::Le => "<=",
        }
    }
}

/// Equality filter shorthand.
pub fn eq(field: &'static str, value: impl Into<Value>) -> Filter {
    Filter {
        field,
        op: FilterOp::Eq,
        value: value.into(),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Typed access to one backend collection.
#[derive(Clone)]
pub struct DocumentStore {
    client: BackendClient,
}

impl DocumentStore {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Fetch one document by id.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<T, RemoteError> {
        self.client
            .request(Method::GET, &format!("v1/{collection}/{id}"), None, None)
            .await
    }

    /// Run a filtered query against a collection.
    pub async fn query<T: DeserializeOwned>(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<(&str, SortOrder)>,
        limit: Option<u32>,
    ) -> Result<Vec<T>, RemoteError> {
        let filters: Vec<Value> = filters
            .iter()
            .map(|f| {
                json!({
                    "field": f.field,
                    "op": f.op.as_str(),
                    "value": f.value,
                })
            })
            .collect();

        let mut body = json!({ "filters": filters });
        if let Some((field, order)) = order_by {
            body["order_by"] = json!({ "field": field, "direction": order.as_str() });
        }
        if let Some(limit) = limit {
            body["limit"] = json!(limit);
        }

        #[derive(serde::Deserialize)]
        struct QueryResponse<T> {
            documents: Vec<T>,
        }

        let resp: QueryResponse<T> = self.action(collection, "query", body).await?;
        Ok(resp.documents)
    }

    /// Invoke a named server-side action on a collection.
    pub async fn action<T: DeserializeOwned>(
        &self,
        collection: &str,
        action: &str,
        body: Value,
    ) -> Result<T, RemoteError> {
        self.client
            .request(
                Method::POST,
                &format!("v1/{collection}:{action}"),
                None,
                Some(body),
            )
            .await
    }

    /// Invoke a named server-side action, discarding the response.
    pub async fn action_unit(
        &self,
        collection: &str,
        action: &str,
        body: Value,
    ) -> Result<(), RemoteError> {
        self.client
            .request_unit(
                Method::POST,
                &format!("v1/{collection}:{action}"),
                None,
                Some(body),
            )
            .await
    }

    /// Create a document, returning the stored form.
    pub async fn create<T: DeserializeOwned>(
        &self,
        collection: &str,
        document: Value,
    ) -> Result<T, RemoteError> {
        self.client
            .request(
                Method::POST,
                &format!("v1/{collection}"),
                None,
                Some(document),
            )
            .await
    }

    /// Patch named fields of a document, returning the stored form.
    pub async fn patch<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<T, RemoteError> {
        self.client
            .request(
                Method::PATCH,
                &format!("v1/{collection}/{id}"),
                None,
                Some(fields),
            )
            .await
    }

    /// Patch named fields of a document, discarding the response.
    pub async fn patch_unit(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<(), RemoteError> {
        self.client
            .request_unit(
                Method::PATCH,
                &format!("v1/{collection}/{id}"),
                None,
                Some(fields),
            )
            .await
    }

    /// Delete a document.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.client
            .request_unit(Method::DELETE, &format!("v1/{collection}/{id}"), None, None)
            .await
    }
}
