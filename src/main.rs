use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use direwolf_display::config::Settings;
use direwolf_display::passcode::generate_passcode;
use direwolf_display::web::{AppState, start_web_server};

#[derive(Parser)]
#[command(name = "direwolf-display", about = "Realtime display server for Direwolf APRS packets and RSSI samples", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web server
    Serve {
        /// Interface to bind
        #[arg(long, default_value = "0.0.0.0")]
        interface: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8060)]
        port: u16,
    },
    /// Generate an APRS-IS passcode from a callsign
    Passcode {
        /// Amateur radio callsign (optionally with SSID, e.g. N0CALL-10)
        #[arg(long)]
        callsign: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { interface, port } => {
            let settings = Settings::from_env()?;
            let state = AppState::new(settings)?;
            start_web_server(interface, port, state).await
        }
        Commands::Passcode { callsign } => {
            let code = generate_passcode(&callsign)?;
            println!("{}", code);
            Ok(())
        }
    }
}
