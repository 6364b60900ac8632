use docrag_core::config::EmbeddingConfig;
use docrag_core::traits::Embedder;
use docrag_embed::load_embedder;

fn main() -> anyhow::Result<()> {
    let embedder = load_embedder(&EmbeddingConfig::default())?;
    let texts = vec!["How do humanoid robots balance?".to_string(), "rust embeddings".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("model={} B={} dim={}", embedder.model_id(), embs.len(), embedder.dim());
    Ok(())
}
