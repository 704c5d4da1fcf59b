mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "webpilot")]
#[command(about = "Control client for a remote browser-automation session", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize webpilot configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and backend health
    Status,

    /// Manage the remote browser lifecycle
    Browser {
        #[command(subcommand)]
        command: BrowserCommands,
    },

    /// Navigate the remote browser to a URL
    Navigate {
        /// Target URL (bare hosts are accepted)
        url: String,
    },

    /// Run the agent with a prompt and wait for the result
    Prompt {
        /// What the agent should do
        text: String,
    },

    /// List the available commands
    Actions {
        /// Substring filter (all commands if omitted)
        filter: Option<String>,
    },

    /// Control screenshot streaming
    Streaming {
        #[command(subcommand)]
        command: StreamingCommands,
    },

    /// Forward a cursor click at page coordinates
    Click {
        x: f64,
        y: f64,
    },

    /// Attach to the push channel and print session events
    Watch {
        /// Write screenshot frames to the screenshots directory
        #[arg(long)]
        save_frames: bool,
    },

    /// Interactive console with the command palette
    Console,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum BrowserCommands {
    /// Start the remote browser and its screenshot stream
    Start,
    /// Stop the remote browser
    Stop,
}

#[derive(Subcommand)]
enum StreamingCommands {
    /// Set the streaming frame rate (1-30 Hz)
    SetFps {
        fps: u32,
    },
    /// Start screenshot streaming
    Start,
    /// Stop screenshot streaming
    Stop,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Get a config value by dot-separated key (e.g. server.base_url)
    Get {
        key: String,
    },
    /// Set a config value by dot-separated key
    Set {
        key: String,
        /// Value to set (auto-detects JSON types)
        value: String,
    },
    /// Show the full configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Browser { command } => match command {
            BrowserCommands::Start => {
                commands::browser::start().await?;
            }
            BrowserCommands::Stop => {
                commands::browser::stop().await?;
            }
        },
        Commands::Navigate { url } => {
            commands::navigate::run(&url).await?;
        }
        Commands::Prompt { text } => {
            commands::prompt::run(&text).await?;
        }
        Commands::Actions { filter } => {
            commands::actions::run(filter.as_deref()).await?;
        }
        Commands::Streaming { command } => match command {
            StreamingCommands::SetFps { fps } => {
                commands::streaming::set_fps(fps).await?;
            }
            StreamingCommands::Start => {
                commands::streaming::start().await?;
            }
            StreamingCommands::Stop => {
                commands::streaming::stop().await?;
            }
        },
        Commands::Click { x, y } => {
            commands::browser::click(x, y).await?;
        }
        Commands::Watch { save_frames } => {
            commands::watch::run(save_frames).await?;
        }
        Commands::Console => {
            commands::console::run().await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Get { key } => {
                commands::config_cmd::get(&key).await?;
            }
            ConfigCommands::Set { key, value } => {
                commands::config_cmd::set(&key, &value).await?;
            }
            ConfigCommands::Show => {
                commands::config_cmd::show().await?;
            }
        },
    }

    Ok(())
}
