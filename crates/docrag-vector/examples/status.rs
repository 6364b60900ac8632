use docrag_core::config::Config;
use docrag_core::traits::VectorStore;
use docrag_vector::LanceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Config::load()?.settings()?;
    let store = LanceStore::connect(&settings.store.uri).await?;
    let points = store.count(&settings.store.collection).await?;
    println!("collection '{}' at {}: {} points", settings.store.collection, settings.store.uri, points);
    Ok(())
}
