use tokio::sync::mpsc;

use webpilot_commands::run_updates;

use super::{connect_client, push_channel};

pub async fn run() -> anyhow::Result<()> {
    let client = connect_client()?;

    let channel = push_channel(&client);
    let (update_tx, update_rx) = mpsc::channel(64);
    if let Err(e) = channel
        .connect(&client.config.server.ws_endpoint(), update_tx)
        .await
    {
        // The console still works for REST commands; agent tasks will
        // fail locally until the channel is up.
        eprintln!("⚠ push channel unavailable: {}", e);
    }
    let updates = tokio::spawn(run_updates(
        client.correlator.clone(),
        client.session.clone(),
        update_rx,
    ));

    let result = webpilot_console::run(client.dispatcher.clone(), client.session.clone()).await;

    channel.disconnect().await;
    updates.abort();
    result?;
    Ok(())
}
