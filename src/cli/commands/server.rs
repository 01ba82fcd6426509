use clap::Subcommand;
use serde_json::Value;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health status from the /health endpoint")]
    Health {
        #[arg(long, default_value = "http://localhost:5000", help = "Server base URL")]
        url: String,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Health { url } => {
            let endpoint = format!("{}/health", url.trim_end_matches('/'));
            let response = reqwest::get(&endpoint).await?;
            let status = response.status();
            let body: Value = response.json().await?;

            if status.is_success() {
                output_success(&output_format, &format!("{} is healthy", url), Some(body))
            } else {
                output_error(
                    &output_format,
                    &format!("{} reported {}", url, status),
                    Some("SERVER_UNHEALTHY"),
                )?;
                anyhow::bail!("server unhealthy")
            }
        }
    }
}
