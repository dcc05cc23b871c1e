use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use gcode_stream::config::StreamConfig;
use gcode_stream::sim::Console;

/// Pretend controller console for exercising the streamer end to end
/// without hardware: point `gcode-stream` at the bind address (with a
/// config whose port matches) and watch the lines get acknowledged.
#[derive(Parser, Debug)]
#[command(about = "Run a pretend CNC controller console on a TCP port")]
pub struct Args {
    #[arg(
    long,
    default_value = "127.0.0.1:2323",
    long_help = "Address to listen on."
    )]
    pub bind: String,
    #[arg(long, default_value = None, long_help = "Optional wire configuration file, same format as the streamer's.")]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config: StreamConfig = match &args.config {
        Some(path) => serde_json::from_str(
            &tokio::fs::read_to_string(path)
                .await
                .expect("Unable to read configuration file"),
        )
        .expect("Invalid configuration file"),
        None => StreamConfig::default(),
    };

    let listener = TcpListener::bind(&args.bind).await?;
    println!("Console listening on {}", args.bind);
    Console::new(config).serve(listener).await?;

    Ok(())
}
