//! Environment configuration for the tldr service.

use std::env;

pub const DEFAULT_PORT: u16 = 9103;
pub const DEFAULT_DB_PATH: &str = "./tldr.db";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub db_path: String,
    /// Written into the config store's global `tldr_echo` at startup
    pub echo_default: Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: lookup("TLDR_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            db_path: lookup("TLDR_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            echo_default: lookup("TLDR_ECHO_DEFAULT").filter(|s| !s.trim().is_empty()),
        }
    }
}
