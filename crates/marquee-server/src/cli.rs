//! Command-line flags. Anything given here overrides the config file.

use clap::Parser;
use marquee_core::AppConfig;
use marquee_core::config::Environment;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "marquee-server", version, about = "Marquee movie catalog API server")]
pub struct Cli {
    /// YAML config file. Missing file means built-in defaults.
    #[arg(long, env = "MARQUEE_CONFIG")]
    pub config: Option<PathBuf>,

    /// API server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Environment (development|staging|production)
    #[arg(long)]
    pub env: Option<Environment>,

    /// PostgreSQL DSN
    #[arg(long = "db-dsn", env = "MARQUEE_DB_DSN", hide_env_values = true)]
    pub db_dsn: Option<String>,

    /// Rate limiter maximum requests per second
    #[arg(long)]
    pub limiter_rps: Option<f64>,

    /// Rate limiter maximum burst
    #[arg(long)]
    pub limiter_burst: Option<u32>,

    /// Enable rate limiter
    #[arg(long)]
    pub limiter_enabled: Option<bool>,

    /// Trusted CORS origins (space separated)
    #[arg(long, value_delimiter = ' ', num_args = 1..)]
    pub cors_trusted_origins: Vec<String>,
}

impl Cli {
    /// Read the config file (if any), apply flag overrides and validate.
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) if path.exists() => AppConfig::from_file(path)?,
            Some(path) => {
                tracing::warn!(path = %path.display(), "config file not found, using defaults");
                AppConfig::default()
            }
            None => AppConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(env) = self.env {
            config.server.env = env;
        }
        if let Some(dsn) = &self.db_dsn {
            config.database.dsn = dsn.clone();
        }
        if let Some(rps) = self.limiter_rps {
            config.limiter.rps = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.limiter.burst = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.limiter.enabled = enabled;
        }
        if !self.cors_trusted_origins.is_empty() {
            config.cors.trusted_origins = self
                .cors_trusted_origins
                .iter()
                .filter(|o| !o.is_empty())
                .cloned()
                .collect();
        }
    }
}
