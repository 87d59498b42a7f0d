//! API server configuration.

use std::time::Duration;

/// Google's signing keys for Firebase ID tokens.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Submissions per second per client IP
    pub rate_limit_rps: u32,
    pub request_timeout: Duration,
    /// Narration requests carry their audio inline, so this is generous
    pub max_body_size: usize,
    /// development or production
    pub environment: String,
    /// Audience and issuer suffix of accepted ID tokens
    pub firebase_project_id: String,
    pub jwks_url: String,
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 2,
            request_timeout: Duration::from_secs(30),
            max_body_size: 50 * 1024 * 1024,
            environment: "development".to_string(),
            firebase_project_id: String::new(),
            jwks_url: FIREBASE_JWKS_URL.to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset or unparsable values
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        macro_rules! parsed {
            ($key:expr) => {
                get($key).and_then(|v| v.trim().parse().ok())
            };
        }

        Self {
            host: get("API_HOST").unwrap_or(defaults.host),
            port: parsed!("API_PORT").unwrap_or(defaults.port),
            cors_origins: get("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: parsed!("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            request_timeout: parsed!("REQUEST_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_body_size: parsed!("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
            firebase_project_id: get("FIREBASE_PROJECT_ID")
                .or_else(|| get("GCP_PROJECT_ID"))
                .unwrap_or_default(),
            jwks_url: get("FIREBASE_JWKS_URL").unwrap_or(defaults.jwks_url),
            metrics_enabled: get("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_lookup_reads_overrides() {
        let env: HashMap<&str, &str> = [
            ("API_PORT", "9100"),
            ("CORS_ORIGINS", "https://app.example.com, https://admin.example.com"),
            ("GCP_PROJECT_ID", "vidgen-prod"),
            ("ENVIRONMENT", "Production"),
            ("METRICS_ENABLED", "0"),
        ]
        .into_iter()
        .collect();

        let config = ApiConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.port, 9100);
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.cors_origins[1], "https://admin.example.com");
        assert_eq!(config.firebase_project_id, "vidgen-prod");
        assert!(config.is_production());
        assert!(!config.metrics_enabled);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = ApiConfig::from_lookup(|k| match k {
            "API_PORT" => Some("not-a-port".to_string()),
            "MAX_BODY_SIZE" => Some(" ".to_string()),
            _ => None,
        });
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_body_size, 50 * 1024 * 1024);
        assert_eq!(config.jwks_url, FIREBASE_JWKS_URL);
    }
}
