use crate::commands::{build_sampler, open_store};
use crate::error::Result;
use crate::models::AppConfig;

/// Fetch prices once and store them
pub async fn run(bonds: bool) -> Result<()> {
    let config = AppConfig::from_env()?;
    let store = open_store(&config).await?;
    let sampler = build_sampler(&config, store.clone())?;

    if bonds && !sampler.has_bond_sources() {
        eprintln!("⚠️  Bond yields requested but PERPLEXITY_KEY / PROMPT_BONDS are not set; skipping bonds");
    }

    println!("📥 Collecting prices{}...", if bonds { " and bond yields" } else { "" });
    let stored = sampler.collect(bonds).await;
    store.close().await;

    let stored = stored?;
    println!("✅ Stored {} samples", stored);
    Ok(())
}
