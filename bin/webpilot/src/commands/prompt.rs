use tokio::sync::mpsc;

use webpilot_commands::{run_updates, Outcome, TaskResolution};
use webpilot_core::session::SessionEvent;

use super::{connect_client, push_channel};

/// Run the agent and stay attached until the task resolves.
pub async fn run(text: &str) -> anyhow::Result<()> {
    let client = connect_client()?;

    // The push channel carries the task's progress and completion.
    let channel = push_channel(&client);
    let (update_tx, update_rx) = mpsc::channel(64);
    channel
        .connect(&client.config.server.ws_endpoint(), update_tx)
        .await?;
    let updates = tokio::spawn(run_updates(
        client.correlator.clone(),
        client.session.clone(),
        update_rx,
    ));

    let mut events = client.session.subscribe();
    let outcome = client.dispatcher.submit("prompt", text).await;

    let result = match outcome {
        Ok(Outcome::Completed { message }) => {
            println!("✓ {}", message);
            Ok(())
        }
        Ok(Outcome::Started {
            interaction_id,
            mut resolution,
        }) => {
            println!("… task {} started", interaction_id);
            loop {
                tokio::select! {
                    resolved = &mut resolution => {
                        match resolved {
                            Ok(TaskResolution::Completed(message)) => {
                                println!("✓ {}", message);
                                break Ok(());
                            }
                            Ok(TaskResolution::Failed(message)) => {
                                break Err(anyhow::anyhow!(message));
                            }
                            Err(_) => {
                                break Err(anyhow::anyhow!("resolution channel dropped"));
                            }
                        }
                    }
                    event = events.recv() => {
                        if let Ok(SessionEvent::Progress(Some(note))) = event {
                            println!("… {}", note);
                        }
                    }
                }
            }
        }
        Err(e) => Err(e.into()),
    };

    channel.disconnect().await;
    updates.abort();
    result
}
