use std::collections::BTreeMap;
use std::time::Duration;

use futures::{StreamExt, stream};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{BulkOutcome, DocFailure, Role, error};
use crate::config::Config;

/// Documents per bulk sub-request and how many sub-requests are kept in
/// flight at once. Chunking above this (the batch writer's 100k rows) exists
/// for memory bounding; this exists for request sizing.
const BULK_DOCS_PER_REQUEST: usize = 500;
const BULK_CONCURRENCY: usize = 4;

/// Elasticsearch client speaking the plain REST API.
pub struct ElasticStore {
    http_client: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
}

impl ElasticStore {
    /// # Errors
    ///
    /// Fails if credentials are missing or the store URL is malformed.
    pub fn new(config: &Config) -> error::Result<Self> {
        let (username, password) = config.es_credentials();
        if username.is_empty() || password.is_empty() {
            return Err(error::Error::Auth);
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.es_timeout_secs()))
            .danger_accept_invalid_certs(config.es_insecure())
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(&config.es_url())?,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn url(&self, path: &str) -> error::Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> error::Result<reqwest::Response> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(error::Error::Auth),
            _ => Ok(response),
        }
    }

    async fn checked(response: reqwest::Response) -> error::Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(error::Error::Request {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn bulk_request(
        &self,
        index: &str,
        docs: Vec<serde_json::Value>,
    ) -> error::Result<BulkOutcome> {
        let submitted = docs.len();

        let mut body = String::new();
        for doc in &docs {
            body.push_str("{\"index\":{}}\n");
            body.push_str(&serde_json::to_string(doc)?);
            body.push('\n');
        }

        let request = self
            .http_client
            .post(self.url(&format!("{index}/_bulk"))?)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);

        let response: BulkResponse = Self::checked(self.send(request).await?)
            .await?
            .json()
            .await?;

        let failures = response
            .items
            .into_iter()
            .filter_map(|item| item.index)
            .filter_map(|action| {
                action.error.map(|error| DocFailure {
                    id: action.id,
                    reason: error.to_string(),
                })
            })
            .collect();

        Ok(BulkOutcome {
            submitted,
            failures,
        })
    }
}

impl super::Store for ElasticStore {
    async fn index_exists(&self, index: &str) -> error::Result<bool> {
        let response = self.send(self.http_client.head(self.url(index)?)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(error::Error::Request {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn create_index(&self, index: &str, mapping: &serde_json::Value) -> error::Result<()> {
        let request = self.http_client.put(self.url(index)?).json(mapping);
        Self::checked(self.send(request).await?).await?;

        Ok(())
    }

    async fn delete_index(&self, index: &str) -> error::Result<()> {
        let response = self.send(self.http_client.delete(self.url(index)?)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::checked(response).await?;

        Ok(())
    }

    async fn write_docs(
        &self,
        index: &str,
        docs: Vec<serde_json::Value>,
    ) -> error::Result<BulkOutcome> {
        let batches: Vec<Vec<serde_json::Value>> = docs
            .chunks(BULK_DOCS_PER_REQUEST)
            .map(<[serde_json::Value]>::to_vec)
            .collect();

        let mut requests = stream::iter(batches)
            .map(|batch| self.bulk_request(index, batch))
            .buffer_unordered(BULK_CONCURRENCY);

        let mut outcome = BulkOutcome::default();
        while let Some(result) = requests.next().await {
            outcome.absorb(result?);
        }

        Ok(outcome)
    }

    async fn write_doc(
        &self,
        index: &str,
        id: &str,
        doc: &serde_json::Value,
    ) -> error::Result<()> {
        let request = self
            .http_client
            .put(self.url(&format!("{index}/_doc/{id}"))?)
            .json(doc);
        Self::checked(self.send(request).await?).await?;

        Ok(())
    }

    async fn count_term(&self, index: &str, field: &str, value: &str) -> error::Result<u64> {
        let request = self
            .http_client
            .post(self.url(&format!("{index}/_count"))?)
            .json(&term_query(field, value));

        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }

        let counted: CountResponse = Self::checked(response).await?.json().await?;

        Ok(counted.count)
    }

    async fn delete_by_term(&self, index: &str, field: &str, value: &str) -> error::Result<()> {
        let mut url = self.url(&format!("{index}/_delete_by_query"))?;
        url.query_pairs_mut().append_pair("refresh", "true");

        let request = self.http_client.post(url).json(&term_query(field, value));

        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::checked(response).await?;

        Ok(())
    }

    async fn fetch_role(&self, name: &str) -> error::Result<Option<Role>> {
        let request = self
            .http_client
            .get(self.url(&format!("_security/role/{name}"))?);

        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let mut roles: BTreeMap<String, Role> = Self::checked(response).await?.json().await?;

        Ok(roles.remove(name))
    }

    async fn fetch_roles(&self) -> error::Result<BTreeMap<String, Role>> {
        let request = self.http_client.get(self.url("_security/role")?);

        Ok(Self::checked(self.send(request).await?)
            .await?
            .json()
            .await?)
    }

    async fn put_role(&self, name: &str, role: &Role) -> error::Result<()> {
        let request = self
            .http_client
            .put(self.url(&format!("_security/role/{name}"))?)
            .json(role);
        Self::checked(self.send(request).await?).await?;

        Ok(())
    }
}

/// The term-filter body shared by `_count` and `_delete_by_query`.
fn term_query(field: &str, value: &str) -> serde_json::Value {
    let mut term = serde_json::Map::new();
    term.insert(field.to_string(), json!(value));

    json!({
        "query": {
            "bool": {
                "filter": {
                    "term": term
                }
            }
        }
    })
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<BulkItem>,
}

#[derive(Deserialize)]
struct BulkItem {
    #[serde(alias = "create")]
    index: Option<BulkAction>,
}

#[derive(Deserialize)]
struct BulkAction {
    #[serde(rename = "_id")]
    id: Option<String>,
    error: Option<serde_json::Value>,
}
