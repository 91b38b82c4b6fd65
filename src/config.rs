use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub media_dir: String,
    pub database_url: String,
    pub auth_verify_url: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Photo gallery and blog backend API")]
pub struct Args {
    /// Host to bind to (overrides DARKROOM_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DARKROOM_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded media is stored (overrides DARKROOM_MEDIA_DIR)
    #[arg(long)]
    pub media_dir: Option<String>,

    /// Database URL (overrides DARKROOM_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Auth service token-verify endpoint (overrides DARKROOM_AUTH_VERIFY_URL).
    /// When unset, identity is taken from trusted x-user-* headers.
    #[arg(long)]
    pub auth_verify_url: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("DARKROOM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("DARKROOM_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing DARKROOM_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading DARKROOM_PORT"),
        };
        let env_media = env::var("DARKROOM_MEDIA_DIR").unwrap_or_else(|_| "./data/media".into());
        let env_db = env::var("DARKROOM_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/darkroom.db".into());
        let env_verify = env::var("DARKROOM_AUTH_VERIFY_URL").ok();

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            media_dir: args.media_dir.unwrap_or(env_media),
            database_url: args.database_url.unwrap_or(env_db),
            auth_verify_url: args.auth_verify_url.or(env_verify),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
