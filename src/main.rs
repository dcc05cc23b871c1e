use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use gcode_stream::config::StreamConfig;
use gcode_stream::stream::run_transfer;

#[derive(Parser, Debug)]
#[command(about = "Stream a g-code file to a CNC controller over telnet")]
pub struct Args {
    /// g-code file to be streamed
    pub gcode_file: PathBuf,
    /// Controller hostname or IP address
    pub ipaddr: String,
    #[arg(short, long, long_help = "Suppress per-line output during the transfer.")]
    pub quiet: bool,
    #[arg(
    long,
    default_value = "./stream-config.json",
    long_help = "Path to the wire configuration file."
    )]
    pub config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.config.exists() {
        tokio::fs::write(
            &args.config,
            serde_json::to_string_pretty(&StreamConfig::default())?,
        )
        .await?;
    }

    let config: StreamConfig = serde_json::from_str(
        &tokio::fs::read_to_string(&args.config)
            .await
            .expect("Unable to read configuration file"),
    )
    .expect("Invalid configuration file");

    run_transfer(&args.gcode_file, &args.ipaddr, args.quiet, &config)
        .await
        .with_context(|| {
            format!(
                "transfer of {} to {} failed",
                args.gcode_file.display(),
                args.ipaddr
            )
        })?;

    Ok(())
}
