//! Pinecone REST client: control plane for index management, data plane for upsert and query.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::vector_index::{
    BoxFuture, IndexDescription, IndexSpec, Metric, QueryMatch, VectorIndex, VectorIndexError,
    VectorRecord,
};

pub const DEFAULT_CONTROL_URL: &str = "https://api.pinecone.io";
pub const API_VERSION: &str = "2025-01";

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub control_url: String,
    /// Interval between readiness polls after creating an index.
    pub ready_poll_interval: Duration,
    /// Readiness polls before giving up; zero skips waiting.
    pub ready_max_polls: u32,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            control_url: DEFAULT_CONTROL_URL.into(),
            ready_poll_interval: Duration::from_secs(2),
            ready_max_polls: 60,
        }
    }
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
    spec: ServerlessSpecWrapper<'a>,
}

#[derive(Serialize)]
struct ServerlessSpecWrapper<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Deserialize)]
struct IndexModel {
    name: String,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    metric: Option<Metric>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl From<IndexModel> for IndexDescription {
    fn from(model: IndexModel) -> Self {
        Self {
            name: model.name,
            dimension: model.dimension,
            metric: model.metric,
            host: model.host,
        }
    }
}

pub struct PineconeClient {
    http: reqwest::Client,
    api_key: String,
    control_url: Url,
    config: PineconeConfig,
    hosts: RwLock<HashMap<String, Url>>,
}

impl std::fmt::Debug for PineconeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeClient")
            .field("control_url", &self.control_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl PineconeClient {
    /// # Errors
    ///
    /// Returns an error if `config.control_url` is not a valid URL.
    pub fn new(
        http: reqwest::Client,
        api_key: impl Into<String>,
        config: PineconeConfig,
    ) -> Result<Self, VectorIndexError> {
        let control_url = Url::parse(&config.control_url).map_err(|e| {
            VectorIndexError::Connection(format!("invalid control URL {}: {e}", config.control_url))
        })?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            control_url,
            config,
            hosts: RwLock::new(HashMap::new()),
        })
    }

    fn control_endpoint(&self, path: &str) -> Result<Url, VectorIndexError> {
        self.control_url
            .join(path)
            .map_err(|e| VectorIndexError::Connection(format!("invalid control path {path}: {e}")))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, VectorIndexError> {
        let response = builder
            .send()
            .await
            .map_err(|e| VectorIndexError::Connection(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VectorIndexError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| VectorIndexError::Serialization(e.to_string()))
    }

    async fn describe(&self, name: &str) -> Result<IndexModel, VectorIndexError> {
        let url = self.control_endpoint(&format!("indexes/{name}"))?;
        match self.send(self.request(reqwest::Method::GET, url)).await {
            Err(VectorIndexError::Api { status: 404, .. }) => {
                Err(VectorIndexError::IndexNotFound(name.to_owned()))
            }
            other => other,
        }
    }

    /// Resolve (and cache) the data-plane base URL of `name`.
    async fn data_url(&self, name: &str, path: &str) -> Result<Url, VectorIndexError> {
        if let Some(host) = self.hosts.read().await.get(name) {
            return join_data_path(host, path);
        }
        let model = self.describe(name).await?;
        let host = model
            .host
            .ok_or_else(|| VectorIndexError::Backend(format!("index {name} has no host yet")))?;
        let base = parse_host(&host)?;
        let url = join_data_path(&base, path)?;
        self.hosts.write().await.insert(name.to_owned(), base);
        Ok(url)
    }

    async fn wait_until_ready(&self, name: &str) -> Result<(), VectorIndexError> {
        for attempt in 0..self.config.ready_max_polls {
            let model = self.describe(name).await?;
            if model.status.is_some_and(|s| s.ready) {
                tracing::debug!(index = name, attempt, "index ready");
                return Ok(());
            }
            tokio::time::sleep(self.config.ready_poll_interval).await;
        }
        if self.config.ready_max_polls == 0 {
            return Ok(());
        }
        Err(VectorIndexError::NotReady(name.to_owned()))
    }
}

/// Hosts come back without a scheme (`docs-abc.svc.aws.pinecone.io`); default to https.
fn parse_host(host: &str) -> Result<Url, VectorIndexError> {
    let with_scheme = if host.contains("://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    };
    Url::parse(&with_scheme)
        .map_err(|e| VectorIndexError::Connection(format!("invalid index host {host}: {e}")))
}

fn join_data_path(base: &Url, path: &str) -> Result<Url, VectorIndexError> {
    base.join(path)
        .map_err(|e| VectorIndexError::Connection(format!("invalid data path {path}: {e}")))
}

impl VectorIndex for PineconeClient {
    fn list_indexes(&self) -> BoxFuture<'_, Result<Vec<IndexDescription>, VectorIndexError>> {
        Box::pin(async move {
            let url = self.control_endpoint("indexes")?;
            let list: IndexList = self.send(self.request(reqwest::Method::GET, url)).await?;
            Ok(list.indexes.into_iter().map(IndexDescription::from).collect())
        })
    }

    fn create_index(&self, spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorIndexError>> {
        let spec = spec.clone();
        Box::pin(async move {
            let url = self.control_endpoint("indexes")?;
            let body = CreateIndexRequest {
                name: &spec.name,
                dimension: spec.dimension,
                metric: spec.metric,
                spec: ServerlessSpecWrapper {
                    serverless: ServerlessSpec {
                        cloud: &spec.cloud,
                        region: &spec.region,
                    },
                },
            };
            let created: Result<serde_json::Value, _> = self
                .send(self.request(reqwest::Method::POST, url).json(&body))
                .await;
            match created {
                Ok(_) => {}
                Err(VectorIndexError::Api { status: 409, .. }) => {
                    return Err(VectorIndexError::IndexExists(spec.name));
                }
                Err(e) => return Err(e),
            }
            tracing::info!(
                index = %spec.name,
                dimension = spec.dimension,
                metric = %spec.metric,
                cloud = %spec.cloud,
                region = %spec.region,
                "created Pinecone index"
            );
            self.wait_until_ready(&spec.name).await
        })
    }

    fn upsert(
        &self,
        index: &str,
        records: Vec<VectorRecord>,
    ) -> BoxFuture<'_, Result<usize, VectorIndexError>> {
        let index = index.to_owned();
        Box::pin(async move {
            let url = self.data_url(&index, "vectors/upsert").await?;
            let body = UpsertRequest {
                vectors: records
                    .iter()
                    .map(|r| PineconeVector {
                        id: &r.id,
                        values: &r.values,
                        metadata: &r.metadata,
                    })
                    .collect(),
            };
            let response: UpsertResponse = self
                .send(self.request(reqwest::Method::POST, url).json(&body))
                .await?;
            Ok(response.upserted_count)
        })
    }

    fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<QueryMatch>, VectorIndexError>> {
        let index = index.to_owned();
        Box::pin(async move {
            let url = self.data_url(&index, "query").await?;
            let body = QueryRequest {
                vector,
                top_k,
                include_metadata: true,
                include_values: false,
            };
            let response: QueryResponse = self
                .send(self.request(reqwest::Method::POST, url).json(&body))
                .await?;
            Ok(response
                .matches
                .into_iter()
                .map(|m| QueryMatch {
                    id: m.id,
                    score: m.score,
                    metadata: m.metadata,
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> PineconeClient {
        PineconeClient::new(
            reqwest::Client::new(),
            "test-key",
            PineconeConfig {
                control_url: server.uri(),
                ready_poll_interval: Duration::from_millis(1),
                ready_max_polls: 3,
            },
        )
        .unwrap()
    }

    fn spec() -> IndexSpec {
        IndexSpec {
            name: "medical-chatbot".into(),
            dimension: 384,
            metric: Metric::Cosine,
            cloud: "aws".into(),
            region: "us-east-1".into(),
        }
    }

    async fn mount_describe(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/indexes/medical-chatbot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "medical-chatbot",
                "dimension": 384,
                "metric": "cosine",
                "host": server.uri(),
                "status": {"ready": true, "state": "Ready"}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn list_indexes_sends_auth_headers_and_parses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes"))
            .and(header("Api-Key", "test-key"))
            .and(header("X-Pinecone-API-Version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "indexes": [
                    {"name": "medical-chatbot", "dimension": 384, "metric": "cosine",
                     "host": "medical-chatbot-abc.svc.aws.pinecone.io"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let indexes = client(&server).list_indexes().await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "medical-chatbot");
        assert_eq!(indexes[0].dimension, Some(384));
        assert_eq!(indexes[0].metric, Some(Metric::Cosine));
    }

    #[tokio::test]
    async fn index_exists_checks_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"indexes": []})),
            )
            .mount(&server)
            .await;
        assert!(
            !client(&server)
                .index_exists("medical-chatbot")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn create_index_sends_serverless_spec_and_waits_for_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .and(body_json(serde_json::json!({
                "name": "medical-chatbot",
                "dimension": 384,
                "metric": "cosine",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "name": "medical-chatbot",
                "status": {"ready": false}
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_describe(&server).await;

        client(&server).create_index(&spec()).await.unwrap();
    }

    #[tokio::test]
    async fn create_index_conflict_maps_to_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(409).set_body_string("ALREADY_EXISTS"))
            .mount(&server)
            .await;

        let err = client(&server).create_index(&spec()).await.unwrap_err();
        assert!(matches!(err, VectorIndexError::IndexExists(name) if name == "medical-chatbot"));
    }

    #[tokio::test]
    async fn create_index_times_out_when_never_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/indexes/medical-chatbot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "medical-chatbot",
                "status": {"ready": false}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server).create_index(&spec()).await.unwrap_err();
        assert!(matches!(err, VectorIndexError::NotReady(_)));
    }

    #[tokio::test]
    async fn upsert_posts_vectors_to_data_plane_and_caches_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/medical-chatbot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "medical-chatbot",
                "host": server.uri(),
                "status": {"ready": true}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("Api-Key", "test-key"))
            .and(body_json(serde_json::json!({
                "vectors": [
                    {"id": "id-0", "values": [0.5, 0.25], "metadata": {"text": "chunk zero"}}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"upsertedCount": 1})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let pinecone = client(&server);
        let records = vec![VectorRecord {
            id: "id-0".into(),
            values: vec![0.5, 0.25],
            metadata: HashMap::from([("text".to_owned(), serde_json::json!("chunk zero"))]),
        }];
        assert_eq!(
            pinecone
                .upsert("medical-chatbot", records.clone())
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            pinecone.upsert("medical-chatbot", records).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn query_requests_metadata_and_maps_matches() {
        let server = MockServer::start().await;
        mount_describe(&server).await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(serde_json::json!({
                "topK": 1,
                "includeMetadata": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "matches": [
                    {"id": "id-7", "score": 0.83, "metadata": {"text": "Acne is a skin condition."}}
                ],
                "namespace": ""
            })))
            .mount(&server)
            .await;

        let matches = client(&server)
            .query("medical-chatbot", vec![0.1; 384], 1)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "id-7");
        assert_eq!(
            matches[0].metadata_str("text"),
            Some("Acne is a skin condition.")
        );
    }

    #[tokio::test]
    async fn query_unknown_index_maps_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let err = client(&server)
            .query("missing", vec![0.0; 4], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, VectorIndexError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = client(&server).list_indexes().await.unwrap_err();
        match err {
            VectorIndexError::Api { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("invalid api key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_host_adds_https_scheme() {
        let url = parse_host("medical-chatbot-abc.svc.aws.pinecone.io").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(
            join_data_path(&url, "query").unwrap().as_str(),
            "https://medical-chatbot-abc.svc.aws.pinecone.io/query"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let pinecone = PineconeClient::new(
            reqwest::Client::new(),
            "super-secret",
            PineconeConfig::default(),
        )
        .unwrap();
        let debug = format!("{pinecone:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn invalid_control_url_rejected() {
        let result = PineconeClient::new(
            reqwest::Client::new(),
            "k",
            PineconeConfig {
                control_url: "not a url".into(),
                ..PineconeConfig::default()
            },
        );
        assert!(result.is_err());
    }
}
