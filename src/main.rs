// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Comptoir auth operator tool.
//!
//! Checks deployment configuration, inspects access tokens and produces
//! password hashes for seeding a credential store.

use clap::{Parser, Subcommand};
use comptoir_auth::{
    config::Config, db::InMemoryStore, logging, services::password, AppState,
};
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;

/// Comptoir auth operator CLI
#[derive(Parser)]
#[command(name = "comptoir-auth")]
#[command(about = "Operator tooling for the Comptoir auth core", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load configuration and build the token signer
    CheckConfig,

    /// Validate an access token and print its claims
    VerifyToken {
        /// Compact JWT
        token: String,
    },

    /// Read a password from stdin and print its argon2 hash
    HashPassword,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.json_logs);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    match command {
        Commands::CheckConfig => {
            let state = AppState::new(Arc::new(InMemoryStore::new()), config)?;
            // Also validates the seed administrator against the password policy.
            let report = state.auth.seed_essentials().await?;

            tracing::info!(
                issuer = %state.config.jwt_issuer,
                audience = %state.config.jwt_audience,
                access_minutes = state.config.jwt_duration_minutes,
                refresh_days = state.config.refresh_token_days,
                default_role = %state.config.default_role,
                roles = ?report.roles_created,
                seed_admin = report.admin_created,
                "Configuration OK"
            );
        }
        Commands::VerifyToken { token } => {
            let state = AppState::new(Arc::new(InMemoryStore::new()), config)?;
            let claims = state.auth.signer().validate(token.trim())?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Commands::HashPassword => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let secret = line.trim_end_matches(['\r', '\n']);

            password::check_policy(secret, &config.password_policy)?;
            println!("{}", password::hash_password(secret, &config.password_hashing)?);
        }
    }

    Ok(())
}
