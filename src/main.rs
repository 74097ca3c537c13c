//! Scan the local network for Android TVs and print what answers.

use atvremote_client::{ClientConfig, RemoteClient};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atvremote=info".into()),
        )
        .init();

    let storage = std::env::var("ATVREMOTE_DIR").unwrap_or_else(|_| ".atvremote".to_string());
    let client = RemoteClient::new(ClientConfig::new(storage))?;

    println!("Scanning for televisions (20 seconds)...");
    let televisions = client.scan(Duration::from_secs(20)).await?;

    if televisions.is_empty() {
        println!("No televisions found.");
        return Ok(());
    }

    for tv in &televisions {
        let vendor = tv.manufacturer.as_deref().unwrap_or("unknown vendor");
        let paired = if tv.paired { " [paired]" } else { "" };
        println!("  {} at {} ({vendor}){paired}", tv.label(), tv.ip);
    }

    Ok(())
}
