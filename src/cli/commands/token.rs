use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{TokenIssuer, TokenVerifier};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a bearer token with the configured JWT_SECRET")]
    Issue {
        #[arg(long, help = "User id (UUID)")]
        user: Uuid,
        #[arg(long, help = "Tenant id (UUID)")]
        tenant: Uuid,
        #[arg(long, help = "Email embedded in the token")]
        email: String,
        #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },

    #[command(about = "Verify a token and print its claims")]
    Inspect {
        #[arg(help = "Bearer token")]
        token: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;

    match cmd {
        TokenCommands::Issue { user, tenant, email, hours } => {
            let issuer = match hours {
                Some(hours) => TokenIssuer::new(&security.jwt_secret, chrono::Duration::hours(hours as i64))?,
                None => TokenIssuer::from_config(security)?,
            };
            let token = issuer.issue(user, tenant, &email)?;

            match output_format {
                OutputFormat::Json => output_success(&output_format, "Token issued", Some(json!({ "token": token }))),
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
        TokenCommands::Inspect { token } => {
            let claims = TokenVerifier::from_config(security)?.verify(&token)?;
            output_success(
                &output_format,
                &format!("Token valid for user {} in tenant {}", claims.user_id, claims.tenant_id),
                Some(json!({ "claims": claims })),
            )
        }
    }
}
