use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub max_upload_bytes: usize,
    pub openai_api_key: String,
    pub model: String,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        // The service must not start without a credential for the
        // text-generation backend.
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set")?;

        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let max_upload_bytes = match std::env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse()
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Config {
            max_upload_bytes,
            openai_api_key,
            model,
        })
    }
}
