use std::sync::Arc;
use std::time::Duration;

use webpilot_commands::{ControlApi, HttpControlApi};
use webpilot_core::{Config, Paths};

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!("webpilot status");
    println!("===============");
    println!();

    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    println!(
        "Config:   {} {}",
        config_path.display(),
        if config_exists { "✓" } else { "✗ (not found)" }
    );

    if !config_exists {
        println!();
        println!("Run `webpilot init` to initialize.");
        return Ok(());
    }

    let config = Config::load(&config_path)?;
    println!("Backend:  {}", config.server.base_url);
    println!("Push:     {}", config.server.ws_endpoint());
    println!("Stream:   {} Hz", config.streaming.fps);
    println!();

    let api: Arc<dyn ControlApi> = Arc::new(HttpControlApi::new(
        &config.server.base_url,
        Duration::from_secs(config.server.request_timeout_secs),
    ));
    match api.health().await {
        Ok(banner) => println!("Health:   ✓ {}", banner),
        Err(e) => println!("Health:   ✗ {}", e),
    }

    Ok(())
}
