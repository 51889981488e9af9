use anyhow::{Context, Result};
use std::env;

use crate::api::TokenProvider;

const DEFAULT_BASE_URL: &str = "https://schoolmgmt-backend.onrender.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_token: String,
    pub base_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let api_token = env::var("SCHOOL_API_TOKEN")
            .context("SCHOOL_API_TOKEN not found. Please set it in .env file or environment")?;

        if api_token.is_empty() {
            anyhow::bail!("SCHOOL_API_TOKEN is empty");
        }

        let base_url =
            env::var("SCHOOL_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Config {
            api_token,
            base_url,
        })
    }
}

impl TokenProvider for Config {
    fn bearer_token(&self) -> String {
        self.api_token.clone()
    }
}
