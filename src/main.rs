// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the keypebble token issuer

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, error, info, LevelFilter};
use rocket::config::LogLevel;

use keypebble::claims::ClaimMap;
use keypebble::config::{output_config_schema, Config, DEFAULT_POLICY_PATH};
use keypebble::error::TokenError;
use keypebble::jwt::{decode_token, issue_token};
use keypebble::policy::{apply_policy, Policy, PolicySource};
use keypebble::service::build_rocket;

/// Short-lived JWT issuer for registries and Kubernetes clients
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Disable logging
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Issue a token and print it
    Issue {
        /// Path to YAML configuration
        #[arg(long)]
        config: PathBuf,

        /// Custom claims as a JSON object
        #[arg(long)]
        claims: Option<String>,

        /// Policy file applied to the claims
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Generate scope and access from the policy, ignoring requested scopes
        #[arg(long, requires = "policy")]
        generate: bool,
    },

    /// Verify a token and print its claims
    Decode {
        /// Path to YAML configuration
        #[arg(long)]
        config: PathBuf,

        /// Compact JWT
        token: String,
    },

    /// Run the HTTP token service
    Serve {
        /// Path to YAML configuration
        #[arg(long)]
        config: PathBuf,

        /// Policy file (default: policy.path from the configuration, then /etc/keypebble/policy.yaml)
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Load the policy once at start-up instead of on every request
        #[arg(long)]
        no_reload_policy: bool,
    },

    /// Print the JSON schema of the configuration file
    Schema,
}

#[rocket::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(err) = run(cli).await {
        error!("{:#}", err);
        eprintln!("Error: {:#}", err);
        let code = err
            .downcast_ref::<TokenError>()
            .map(TokenError::exit_code)
            .unwrap_or(1);
        process::exit(code);
    }
}

fn log_level(cli: &Cli) -> LevelFilter {
    if cli.quiet {
        LevelFilter::Off
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn init_logging(cli: &Cli) {
    env_logger::Builder::from_default_env()
        .filter_level(log_level(cli))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let rocket_log_level = match log_level(&cli) {
        LevelFilter::Off => LogLevel::Off,
        LevelFilter::Debug => LogLevel::Debug,
        _ => LogLevel::Normal,
    };

    match cli.command {
        Command::Issue {
            config,
            claims,
            policy,
            generate,
        } => {
            let config = Config::from_file(&config)?;
            let mut claims = parse_claims(claims.as_deref())?;

            if let Some(path) = policy {
                let policy = Policy::from_file(&path)?;
                claims = apply_policy(&policy, claims, generate)?;
            }

            let token = issue_token(&config.issuer, claims)?;
            println!("{}", token);
        }

        Command::Decode { config, token } => {
            let config = Config::from_file(&config)?;
            let claims = decode_token(&config.issuer, token.trim())?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }

        Command::Serve {
            config,
            policy,
            no_reload_policy,
        } => {
            let config = Config::from_file(&config)?;
            let policy_path = policy
                .or_else(|| config.policy.path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_POLICY_PATH));
            let reload = config.policy.reload && !no_reload_policy;
            let policy = PolicySource::from_path(&policy_path, reload)?;

            info!(
                "Starting keypebble on {}:{} ({})",
                config.service.host, config.service.port, config.issuer.algorithm
            );
            let figment = rocket::Config::figment()
                .merge((
                    "ident",
                    format!("keypebble/{}", env!("CARGO_PKG_VERSION")),
                ))
                .merge(("address", config.service.host.clone()))
                .merge(("port", config.service.port))
                .merge(("log_level", rocket_log_level));

            let rocket = build_rocket(figment, config.issuer, Some(policy))?;
            rocket.launch().await.context("Token service failed")?;
        }

        Command::Schema => output_config_schema()?,
    }

    Ok(())
}

/// Parse `--claims`; absent means no custom claims
fn parse_claims(claims: Option<&str>) -> Result<ClaimMap> {
    let Some(raw) = claims else {
        return Ok(ClaimMap::new());
    };
    debug!("Parsing custom claims from the command line");
    match serde_json::from_str::<serde_json::Value>(raw).context("--claims is not valid JSON")? {
        serde_json::Value::Object(map) => Ok(map),
        _ => anyhow::bail!("--claims must be a JSON object"),
    }
}
