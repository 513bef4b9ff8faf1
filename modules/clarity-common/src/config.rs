use std::env;

use crate::error::{ClarityError, Result};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SCORING_MODEL: &str = "gpt-4o";
pub const DEFAULT_NEWS_WORKSPACE: &str = "global_news";
pub const DEFAULT_DIAGNOSTIC_WORKSPACE: &str = "diagnostic";
pub const DEFAULT_OVERSAMPLE_FACTOR: u32 = 3;
const MAX_OVERSAMPLE_FACTOR: u32 = 10;

/// Application configuration loaded from environment variables.
/// Every credential is optional: a missing value is reported when a route
/// needs it, never at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: Option<String>,

    // AI / LLM
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: String,
    pub scoring_model: String,

    // Search / fetch
    pub tavily_api_key: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,

    // Billing / auth
    pub stripe_webhook_secret: Option<String>,
    pub supabase_jwt_secret: Option<String>,

    // Workers
    pub news_workspace_id: String,
    pub diagnostic_workspace_id: String,
    pub oversample_factor: u32,

    // Web server
    pub api_host: String,
    pub api_port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            openai_api_key: None,
            openai_base_url: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            scoring_model: DEFAULT_SCORING_MODEL.to_string(),
            tavily_api_key: None,
            browserless_url: None,
            browserless_token: None,
            stripe_webhook_secret: None,
            supabase_jwt_secret: None,
            news_workspace_id: DEFAULT_NEWS_WORKSPACE.to_string(),
            diagnostic_workspace_id: DEFAULT_DIAGNOSTIC_WORKSPACE.to_string(),
            oversample_factor: DEFAULT_OVERSAMPLE_FACTOR,
            api_host: "0.0.0.0".to_string(),
            api_port: 3000,
            allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: non_empty_var("DATABASE_URL"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_base_url: non_empty_var("OPENAI_BASE_URL"),
            openai_model: non_empty_var("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            scoring_model: non_empty_var("OPENAI_SCORING_MODEL")
                .unwrap_or_else(|| DEFAULT_SCORING_MODEL.to_string()),
            tavily_api_key: non_empty_var("TAVILY_API_KEY"),
            browserless_url: non_empty_var("BROWSERLESS_URL"),
            browserless_token: non_empty_var("BROWSERLESS_TOKEN"),
            stripe_webhook_secret: non_empty_var("STRIPE_WEBHOOK_SECRET"),
            supabase_jwt_secret: non_empty_var("SUPABASE_JWT_SECRET"),
            news_workspace_id: non_empty_var("NEWS_WORKSPACE_ID")
                .unwrap_or_else(|| DEFAULT_NEWS_WORKSPACE.to_string()),
            diagnostic_workspace_id: non_empty_var("DIAGNOSTIC_WORKSPACE_ID")
                .unwrap_or_else(|| DEFAULT_DIAGNOSTIC_WORKSPACE.to_string()),
            oversample_factor: parse_oversample_factor(env::var("OVERSAMPLE_FACTOR").ok().as_deref()),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            allowed_origins: parse_origins(&env::var("ALLOWED_ORIGINS").unwrap_or_default()),
        };

        config.log_keys();
        config
    }

    pub fn require_database(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ClarityError::Config("DATABASE_URL is not configured".into()))
    }

    pub fn require_openai(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ClarityError::Config("OPENAI_API_KEY is not configured".into()))
    }

    pub fn require_stripe_secret(&self) -> Result<&str> {
        self.stripe_webhook_secret
            .as_deref()
            .ok_or_else(|| ClarityError::Config("STRIPE_WEBHOOK_SECRET is not configured".into()))
    }

    pub fn require_jwt_secret(&self) -> Result<&str> {
        self.supabase_jwt_secret
            .as_deref()
            .ok_or_else(|| ClarityError::Config("SUPABASE_JWT_SECRET is not configured".into()))
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview_opt(&self.database_url));
        tracing::info!("  OPENAI_API_KEY: {}", preview_opt(&self.openai_api_key));
        tracing::info!("  TAVILY_API_KEY: {}", preview_opt(&self.tavily_api_key));
        tracing::info!("  BROWSERLESS_TOKEN: {}", preview_opt(&self.browserless_token));
        tracing::info!("  STRIPE_WEBHOOK_SECRET: {}", preview_opt(&self.stripe_webhook_secret));
        tracing::info!("  SUPABASE_JWT_SECRET: {}", preview_opt(&self.supabase_jwt_secret));
        tracing::info!(
            "  models: {} / scoring {}, oversample x{}",
            self.openai_model,
            self.scoring_model,
            self.oversample_factor
        );
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_oversample_factor(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .map(|f| f.clamp(1, MAX_OVERSAMPLE_FACTOR))
        .unwrap_or(DEFAULT_OVERSAMPLE_FACTOR)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversample_factor_defaults_and_clamps() {
        assert_eq!(parse_oversample_factor(None), 3);
        assert_eq!(parse_oversample_factor(Some("abc")), 3);
        assert_eq!(parse_oversample_factor(Some("0")), 1);
        assert_eq!(parse_oversample_factor(Some(" 5 ")), 5);
        assert_eq!(parse_oversample_factor(Some("99")), 10);
    }

    #[test]
    fn origins_split_and_trimmed() {
        assert_eq!(
            parse_origins("https://a.test, https://b.test,,"),
            vec!["https://a.test".to_string(), "https://b.test".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn missing_database_is_config_error() {
        let config = Config::default();
        let err = config.require_database().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn present_database_is_returned() {
        let config = Config {
            database_url: Some("postgres://localhost/clarity".into()),
            ..Config::default()
        };
        assert_eq!(config.require_database().unwrap(), "postgres://localhost/clarity");
    }
}
