use docrag_core::config::EmbeddingConfig;
use docrag_core::traits::Embedder;
use docrag_embed::{load_embedder, FakeEmbedder};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let cfg = EmbeddingConfig { fake: true, ..EmbeddingConfig::default() };
    let embedder = load_embedder(&cfg).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim follows config");
    assert_eq!(embedder.dim(), 384);
    assert!(embedder.model_id().starts_with("fake:"));

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn batch_matches_single_calls() {
    let embedder = FakeEmbedder::new(64);
    let texts = vec!["robots balance".to_string(), "inverse kinematics".to_string()];
    let batch = embedder.embed_batch(&texts).expect("batch");
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[1], embedder.embed("inverse kinematics").expect("single"));
}

#[test]
fn missing_model_dir_fails_to_load() {
    let cfg = EmbeddingConfig {
        model_id: "nobody/definitely-not-a-local-model".to_string(),
        model_dir: Some("/nonexistent/model/dir".into()),
        ..EmbeddingConfig::default()
    };
    if std::env::var("APP_USE_FAKE_EMBEDDINGS").is_ok() || std::env::var("APP_MODEL_DIR").is_ok() || std::env::var("MODEL_DIR").is_ok() {
        return;
    }
    assert!(load_embedder(&cfg).is_err());
}
