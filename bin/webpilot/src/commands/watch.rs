use tokio::sync::mpsc;

use webpilot_commands::run_updates;
use webpilot_core::session::SessionEvent;
use webpilot_core::Paths;

use super::{connect_client, push_channel};

/// Attach to the push channel and print session events until Ctrl+C.
/// With `--save-frames`, each screenshot is written as a numbered PNG.
pub async fn run(save_frames: bool) -> anyhow::Result<()> {
    let client = connect_client()?;
    let paths = Paths::new();
    if save_frames {
        paths.ensure_dirs()?;
    }

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

    println!("Watching {} (Ctrl+C to stop)", client.config.server.ws_endpoint());

    let mut events = client.session.subscribe();
    let mut frame_counter: u32 = 0;
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(SessionEvent::Log(entry)) => {
                        let marker = if entry.is_error { "✗" } else { "•" };
                        println!("{} [{}] {}", marker, entry.origin, entry.text);
                    }
                    Ok(SessionEvent::FrameReplaced) => {
                        if let Some(frame) = client.session.frame() {
                            if save_frames {
                                let path = paths.screenshot_file(frame_counter);
                                match frame.decode() {
                                    Ok(bytes) => {
                                        std::fs::write(&path, bytes)?;
                                        println!("• saved {} ({})", path.display(), frame.url);
                                        frame_counter += 1;
                                    }
                                    Err(e) => {
                                        eprintln!("✗ could not decode frame: {}", e);
                                    }
                                }
                            } else {
                                println!("• screenshot ({})", frame.url);
                            }
                        }
                    }
                    Ok(SessionEvent::Connectivity(connectivity)) => {
                        println!("• channel {:?}", connectivity);
                    }
                    Ok(_) => {}
                    Err(_) => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    channel.disconnect().await;
    updates.abort();
    println!();
    println!("Detached.");
    Ok(())
}
