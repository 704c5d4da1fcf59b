use webpilot_core::session::BrowserPhase;

use super::connect_client;

pub async fn start() -> anyhow::Result<()> {
    let client = connect_client()?;
    let message = client.dispatcher.start_browser().await?;
    println!("✓ {}", message);
    Ok(())
}

pub async fn stop() -> anyhow::Result<()> {
    let client = connect_client()?;
    // One-shot process: the local mirror starts at Idle, but the operator
    // is telling us a browser is running backend-side.
    client.session.assume_phase(BrowserPhase::Running);
    let message = client.dispatcher.stop_browser().await?;
    println!("✓ {}", message);
    Ok(())
}

pub async fn click(x: f64, y: f64) -> anyhow::Result<()> {
    let client = connect_client()?;
    let message = client.dispatcher.click(x, y).await?;
    println!("✓ {} ({}, {})", message, x, y);
    Ok(())
}
