use nonprofit_audit_engine::checks::CheckEngine;
use nonprofit_audit_engine::narrative::{GeminiNarrator, MockNarrator, Narrator};
use nonprofit_audit_engine::registry::{EinRegistry, HttpEinRegistry, OfflineRegistry};
use nonprofit_audit_engine::report::{build_audit_report, build_performance_report};
use serde_json::Value;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Nonprofit Audit Engine starting");

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "example_data.json".to_string());
    let text = std::fs::read_to_string(&path)?;
    let payload: Value = serde_json::from_str(&text)?;

    let narrator: Box<dyn Narrator> = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => {
            info!("Using Gemini narrator");
            Box::new(GeminiNarrator::new(key))
        }
        _ => {
            info!("GEMINI_API_KEY not set; narrative runs in mock mode");
            Box::new(MockNarrator)
        }
    };

    // An array payload is a multi-year batch, an object is a single filing
    let rendered = match payload {
        Value::Array(entries) => {
            let report = build_performance_report(&entries, narrator.as_ref()).await?;
            serde_json::to_string_pretty(&report)?
        }
        payload => {
            let registry: Box<dyn EinRegistry> = match HttpEinRegistry::from_env() {
                Some(registry) => Box::new(registry),
                None => Box::new(OfflineRegistry),
            };
            let engine = CheckEngine::with_default_rules();
            let report =
                build_audit_report(&payload, &engine, registry.as_ref(), narrator.as_ref())
                    .await?;
            serde_json::to_string_pretty(&report)?
        }
    };

    println!("{}", rendered);
    Ok(())
}
