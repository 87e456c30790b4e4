//! Runs against a real Qdrant container; needs a Docker daemon.

use std::collections::HashMap;
use std::sync::Arc;

use ragbot_llm::EmbedBatchFuture;
use ragbot_memory::document::{
    Document, DocumentMetadata, EmbedBatchFn, IngestionPipeline, SplitterConfig, TEXT_KEY,
    TextSplitter,
};
use ragbot_memory::{IndexSpec, Metric, QdrantIndex, VectorIndex};
use testcontainers::GenericImage;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

fn spec() -> IndexSpec {
    IndexSpec {
        name: "medical_bot".into(),
        dimension: 4,
        metric: Metric::Cosine,
        cloud: "aws".into(),
        region: "us-east-1".into(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn fake_embed_fn() -> EmbedBatchFn {
    Box::new(|texts: Vec<String>| -> EmbedBatchFuture {
        Box::pin(async move {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32 / 1000.0, 0.1, 0.2, 0.3])
                .collect())
        })
    })
}

fn make_doc(content: &str) -> Document {
    Document {
        content: content.to_owned(),
        metadata: DocumentMetadata {
            source: "book.pdf".to_owned(),
            content_type: "application/pdf".to_owned(),
            extra: HashMap::from([("page".to_owned(), "0".to_owned())]),
        },
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn ingest_twice_then_query() {
    let container = qdrant_image().start().await.unwrap();
    let port = container.get_host_port_ipv4(6334).await.unwrap();
    let index = Arc::new(QdrantIndex::new(&format!("http://127.0.0.1:{port}")).unwrap());

    let pipeline = IngestionPipeline::new(
        TextSplitter::new(SplitterConfig::default()),
        Arc::clone(&index) as Arc<dyn VectorIndex>,
        spec(),
        fake_embed_fn(),
    );

    let docs = [make_doc("Acne is a skin condition."), make_doc("Fever is a symptom.")];
    let first = pipeline.ingest_documents(&docs).await.unwrap();
    assert!(first.created_index);
    assert_eq!(first.chunks, 2);

    let second = pipeline.ingest_documents(&docs).await.unwrap();
    assert!(!second.created_index);

    let matches = index
        .query("medical_bot", vec![0.025, 0.1, 0.2, 0.3], 1)
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert!(matches[0].id.starts_with("id-"));
    assert!(matches[0].metadata_str(TEXT_KEY).is_some());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn create_existing_collection_is_rejected() {
    let container = qdrant_image().start().await.unwrap();
    let port = container.get_host_port_ipv4(6334).await.unwrap();
    let index = QdrantIndex::new(&format!("http://127.0.0.1:{port}")).unwrap();

    index.create_index(&spec()).await.unwrap();
    assert!(index.index_exists("medical_bot").await.unwrap());
    assert!(index.create_index(&spec()).await.is_err());
}
