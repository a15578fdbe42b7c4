//! Example demonstrating the service client's tracing instrumentation.
//!
//! Run with: cargo run -p aiproof-core --example service_tracing
//!
//! Points at `AIPROOF_API_URL` (default `http://localhost:8000`).

use std::time::Duration;

use aiproof_core::{RemoteWatermarkService, ServiceConfig, WatermarkService};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("aiproof_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Watermark Service Tracing Demo ===\n");

    let config = ServiceConfig {
        timeout: Duration::from_secs(10),
        max_retries: 2,
        ..ServiceConfig::default()
    };

    println!("Config: {:?}\n", config);

    let service = match RemoteWatermarkService::with_config(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };

    println!("\nChecking service health...\n");

    match service.health().await {
        Ok(health) => println!("\n✅ {} ({})", health.status, health.service),
        Err(e) => {
            println!("\n❌ Failed: {}", e);
            return;
        }
    }

    println!("\nFetching attack catalog...\n");

    match service.list_attacks().await {
        Ok(attacks) => {
            println!("\n✅ {} attacks", attacks.len());
            for attack in attacks {
                println!("   {:<16} {:<8} {:.2}", attack.name, attack.attack_type, attack.severity);
            }
        }
        Err(e) => {
            println!("\n❌ Failed: {}", e);
        }
    }
}
