use webpilot_core::{Config, Paths};

pub async fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;

    let config_path = paths.config_file();
    if config_path.exists() && !force {
        println!("Config already exists: {}", config_path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    let config = Config::default();
    config.save(&config_path)?;

    println!("✓ Wrote {}", config_path.display());
    println!("  backend: {}", config.server.base_url);
    println!("  push:    {}", config.server.ws_endpoint());
    println!();
    println!("Point webpilot at your backend with:");
    println!("  webpilot config set server.base_url http://host:8000");
    Ok(())
}
