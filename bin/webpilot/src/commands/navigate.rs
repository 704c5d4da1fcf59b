use webpilot_commands::Outcome;

use super::connect_client;

pub async fn run(url: &str) -> anyhow::Result<()> {
    let client = connect_client()?;
    match client.dispatcher.submit("navigate", url).await? {
        Outcome::Completed { message } => {
            println!("✓ {}", message);
        }
        Outcome::Started { .. } => {
            // Navigation is a synchronous command; an async start here
            // would be a backend contract change.
            println!("Navigation started");
        }
    }
    Ok(())
}
