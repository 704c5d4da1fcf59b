use super::connect_client;

pub async fn set_fps(fps: u32) -> anyhow::Result<()> {
    let client = connect_client()?;
    let message = client.dispatcher.set_frame_rate(fps).await?;
    println!("✓ {}", message);
    Ok(())
}

pub async fn start() -> anyhow::Result<()> {
    let client = connect_client()?;
    let message = client.dispatcher.streaming_start().await?;
    println!("✓ {}", message);
    Ok(())
}

pub async fn stop() -> anyhow::Result<()> {
    let client = connect_client()?;
    let message = client.dispatcher.streaming_stop().await?;
    println!("✓ {}", message);
    Ok(())
}
