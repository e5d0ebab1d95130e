// Environment-driven configuration for the web service.

use std::env;
use std::path::PathBuf;

use crate::error::{AppError, Result};

const DEFAULT_SECRET: &str = "dev-secret-key-change-in-production";
const DEFAULT_DATABASE: &str = "chatbot.db";
const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";
const PLACEHOLDER_API_KEY: &str = "your_mistral_api_key_here";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub corpus_dir: PathBuf,
    pub session_secret: String,
    pub mistral_api_key: String,
    pub mistral_base_url: String,
    /// Optional create-or-reset admin credentials applied at startup.
    pub admin_bootstrap: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("MISTRAL_API_KEY").unwrap_or_default();
        if api_key.is_empty() || api_key == PLACEHOLDER_API_KEY {
            return Err(AppError::Config(
                "MISTRAL_API_KEY is not set".to_string(),
            ));
        }

        let session_secret = match env::var("SECRET_KEY") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => DEFAULT_SECRET.to_string(),
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());

        let admin_bootstrap = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email.trim().to_lowercase(), password))
            }
            _ => None,
        };

        Ok(Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            database_path: database_path_from_url(&database_url),
            corpus_dir: PathBuf::from(env::var("CORPUS_DIR").unwrap_or_else(|_| "corpus".to_string())),
            session_secret,
            mistral_api_key: api_key,
            mistral_base_url: env::var("MISTRAL_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            admin_bootstrap,
        })
    }
}

/// Accepts either a bare file path or a `sqlite://` connection string.
fn database_path_from_url(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}
