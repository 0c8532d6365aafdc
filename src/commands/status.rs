use crate::commands::open_store;
use crate::error::Result;
use crate::models::AppConfig;
use crate::services::{ParameterStore, TimeSeriesStore};

pub async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    let store = open_store(&config).await?;

    println!("📊 Price Data Status\n");
    println!("📁 Database: {}", store.database_path().display());
    println!("🕐 Timezone: {}\n", store.timezone());

    let stats = store.indicator_stats().await?;
    if stats.is_empty() {
        println!("⚠️  No samples found. Run 'collect' first.");
    } else {
        println!("═══════════════════════════════════════════════════════════\n");
        for stat in &stats {
            let latest = store.latest(&stat.indicator_type).await?;
            println!("🔹 {} ({})", stat.indicator_type, stat.indicator_country);
            println!("   Records: {:>8}", stat.records);
            if let (Some(first), Some(last)) = (stat.first_seen, stat.last_seen) {
                let tz = store.timezone();
                println!(
                    "   Range:   {} → {}",
                    first.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
                    last.with_timezone(&tz).format("%Y-%m-%d %H:%M")
                );
            }
            if let Some(sample) = latest {
                println!("   Latest:  {:.2}", sample.value);
            }
            println!();
        }
    }

    println!("═══════════════════════════════════════════════════════════\n");
    println!("⚙️  Parameters");
    for parameter in store.all_parameters().await? {
        println!("   {:<18} {}", parameter.name, parameter.value);
    }

    println!("\n🔔 Tracked indicators");
    for indicator in &config.indicators {
        println!("   {:<18} threshold {}%", indicator.to_string(), indicator.threshold_pct);
    }
    println!(
        "\n📧 Email: {}",
        match &config.smtp {
            Some(smtp) => format!("{} recipients via {}", smtp.recipients.len(), smtp.host),
            None => "not configured".to_string(),
        }
    );

    store.close().await;
    Ok(())
}
