//! Startup configuration.
//!
//! Every environment variable the pipeline needs is read and validated once,
//! here. Missing or malformed values are collected and reported together so a
//! misconfigured deployment fails at boot rather than on the first job.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vidgen_firestore::{FirestoreConfig, RetryConfig};
use vidgen_notify::EmailConfig;
use vidgen_render::RemotionConfig;
use vidgen_storage::R2Config;

use crate::error::{WorkerError, WorkerResult};

const DEFAULT_EMAIL_API_BASE: &str = "https://api.resend.com";
const DEFAULT_SPEECH_API_BASE: &str = "https://api.elevenlabs.io";
const DEFAULT_SPEECH_MODEL: &str = "eleven_multilingual_v2";

/// Text-to-speech provider settings.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_base: String,
    pub api_key: String,
    /// Voice used when a request names none
    pub default_voice: Option<String>,
    pub model_id: String,
    pub timeout: Duration,
}

impl SpeechConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_SPEECH_API_BASE.to_string(),
            api_key: api_key.into(),
            default_voice: None,
            model_id: DEFAULT_SPEECH_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Render engine and scratch locations.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub remotion: RemotionConfig,
    /// Bundles and rendered videos
    pub work_dir: PathBuf,
    /// Directory served over HTTP; combined audio lands in `temp/` under it
    pub public_dir: PathBuf,
}

/// Pipeline limits and URLs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Deployment base URL, used for site-relative assets
    pub site_base_url: String,
    /// Base URL the render engine fetches temp assets from
    pub asset_base_url: String,
    /// Host of the managed object storage, whose assets get probed
    pub storage_host: String,
    /// Link to the user's video library in notification emails
    pub library_url: String,
    pub probe_timeout: Duration,
    pub render_timeout: Duration,
    pub upload_max_attempts: u32,
    pub upload_attempt_timeout: Duration,
    pub upload_backoff_base: Duration,
    pub upload_backoff_max: Duration,
    pub fps: u32,
    pub quiz_monthly_limit: u32,
}

impl PipelineConfig {
    /// Defaults for everything but the deployment URLs.
    pub fn new(site_base_url: impl Into<String>, storage_host: impl Into<String>) -> Self {
        let site_base_url = site_base_url.into();
        Self {
            asset_base_url: site_base_url.clone(),
            library_url: format!("{}/library", site_base_url.trim_end_matches('/')),
            site_base_url,
            storage_host: storage_host.into(),
            probe_timeout: Duration::from_secs(10),
            render_timeout: Duration::from_secs(120),
            upload_max_attempts: 3,
            upload_attempt_timeout: Duration::from_secs(300),
            upload_backoff_base: Duration::from_millis(1000),
            upload_backoff_max: Duration::from_millis(10_000),
            fps: vidgen_models::OUTPUT_FPS,
            quiz_monthly_limit: 10,
        }
    }
}

/// Validated configuration for the whole service.
#[derive(Debug, Clone)]
pub struct VidgenConfig {
    pub r2: R2Config,
    pub firestore: FirestoreConfig,
    pub email: EmailConfig,
    /// `None` disables quiz submissions
    pub speech: Option<SpeechConfig>,
    pub render: RenderConfig,
    pub pipeline: PipelineConfig,
}

impl VidgenConfig {
    /// Load from the process environment.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(&lookup);

        let r2 = R2Config {
            endpoint_url: env.required("R2_ENDPOINT_URL"),
            access_key_id: env.required("R2_ACCESS_KEY_ID"),
            secret_access_key: env.required("R2_SECRET_ACCESS_KEY"),
            bucket_name: env.required("R2_BUCKET_NAME"),
            region: env.optional("R2_REGION", "auto"),
            public_base_url: env.required("R2_PUBLIC_URL"),
        };

        let mut firestore = FirestoreConfig::new(env.required_any(&["GCP_PROJECT_ID", "FIREBASE_PROJECT_ID"]));
        firestore.database_id = env.optional("FIRESTORE_DATABASE_ID", "(default)");
        if let Some(endpoint) = env.get("FIRESTORE_ENDPOINT") {
            firestore.endpoint = endpoint;
        }
        firestore.credentials_path = env.get("FIRESTORE_CREDENTIALS_PATH").map(PathBuf::from);
        firestore.timeout = Duration::from_secs(env.parsed("FIRESTORE_TIMEOUT_SECS", 30));
        firestore.connect_timeout =
            Duration::from_secs(env.parsed("FIRESTORE_CONNECT_TIMEOUT_SECS", 5));
        firestore.retry = RetryConfig {
            max_retries: env.parsed("FIRESTORE_MAX_RETRIES", 3),
            base_delay_ms: env.parsed("FIRESTORE_RETRY_BASE_MS", 100),
            max_delay_ms: env.parsed("FIRESTORE_RETRY_MAX_MS", 5000),
        };

        let email = EmailConfig {
            api_base: env.optional("EMAIL_API_BASE", DEFAULT_EMAIL_API_BASE),
            api_key: env.required("EMAIL_API_KEY"),
            from: env.required("EMAIL_FROM"),
            timeout: Duration::from_secs(env.parsed("EMAIL_TIMEOUT_SECS", 15)),
        };

        let speech = env.get("SPEECH_API_KEY").map(|key| {
            let mut speech = SpeechConfig::new(key);
            speech.api_base = env.optional("SPEECH_API_BASE", DEFAULT_SPEECH_API_BASE);
            speech.default_voice = env.get("SPEECH_DEFAULT_VOICE");
            speech.model_id = env.optional("SPEECH_MODEL_ID", DEFAULT_SPEECH_MODEL);
            speech
        });

        let mut remotion = RemotionConfig::new(
            env.optional("REMOTION_PROJECT_DIR", "."),
            env.optional("REMOTION_ENTRY", "src/index.ts"),
        );
        if let Some(launcher) = env.get("REMOTION_LAUNCHER") {
            remotion.launcher = launcher.split_whitespace().map(str::to_string).collect();
        }
        remotion.bundle_timeout = Duration::from_secs(env.parsed("REMOTION_BUNDLE_TIMEOUT_SECS", 120));
        let render = RenderConfig {
            remotion,
            work_dir: PathBuf::from(env.optional("WORK_DIR", "/tmp/vidgen")),
            public_dir: PathBuf::from(env.optional("PUBLIC_DIR", "./public")),
        };

        let site_base_url = env.required("SITE_BASE_URL");
        let storage_host = if r2.public_base_url.is_empty() {
            String::new()
        } else {
            r2.public_host().unwrap_or_else(|e| {
                env.invalid("R2_PUBLIC_URL", &e.to_string());
                String::new()
            })
        };
        let mut pipeline = PipelineConfig::new(site_base_url.clone(), storage_host);
        if let Some(base) = env.get("ASSET_BASE_URL") {
            pipeline.asset_base_url = base;
        }
        if let Some(library) = env.get("LIBRARY_URL") {
            pipeline.library_url = library;
        }
        pipeline.probe_timeout = Duration::from_secs(env.parsed("BACKGROUND_PROBE_TIMEOUT_SECS", 10));
        pipeline.render_timeout = Duration::from_secs(env.parsed("RENDER_TIMEOUT_SECS", 120));
        pipeline.upload_max_attempts = env.parsed("UPLOAD_MAX_ATTEMPTS", 3);
        pipeline.upload_attempt_timeout =
            Duration::from_secs(env.parsed("UPLOAD_ATTEMPT_TIMEOUT_SECS", 300));
        pipeline.upload_backoff_base = Duration::from_millis(env.parsed("UPLOAD_BACKOFF_BASE_MS", 1000));
        pipeline.upload_backoff_max = Duration::from_millis(env.parsed("UPLOAD_BACKOFF_MAX_MS", 10_000));
        pipeline.quiz_monthly_limit = env.parsed("QUIZ_MONTHLY_LIMIT", 10);

        if pipeline.upload_max_attempts == 0 {
            env.invalid("UPLOAD_MAX_ATTEMPTS", "must be at least 1");
        }
        if !site_base_url.is_empty() && url::Url::parse(&site_base_url).is_err() {
            env.invalid("SITE_BASE_URL", "not an absolute URL");
        }

        env.finish()?;

        Ok(Self {
            r2,
            firestore,
            email,
            speech,
            render,
            pipeline,
        })
    }
}

/// Reads keys while remembering every problem it sees.
struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    missing: Vec<String>,
    invalid: Vec<String>,
}

impl<'a> EnvReader<'a> {
    fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Non-empty value of `key`.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, key: &str) -> String {
        self.get(key).unwrap_or_else(|| {
            self.missing.push(key.to_string());
            String::new()
        })
    }

    /// First of `keys` that is set.
    fn required_any(&mut self, keys: &[&str]) -> String {
        keys.iter()
            .find_map(|k| self.get(k))
            .unwrap_or_else(|| {
                self.missing.push(keys.join(" or "));
                String::new()
            })
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&mut self, key: &str, default: T) -> T {
        match self.get(key) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                self.invalid(key, &format!("cannot parse {raw:?}"));
                default
            }),
        }
    }

    fn invalid(&mut self, key: &str, reason: &str) {
        self.invalid.push(format!("{key} ({reason})"));
    }

    fn finish(self) -> WorkerResult<()> {
        let mut problems = Vec::new();
        if !self.missing.is_empty() {
            problems.push(format!("missing {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            problems.push(format!("invalid {}", self.invalid.join(", ")));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(WorkerError::config_error(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("R2_ENDPOINT_URL", "https://acct.r2.cloudflarestorage.com"),
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
            ("R2_BUCKET_NAME", "videos"),
            ("R2_PUBLIC_URL", "https://media.example.com"),
            ("GCP_PROJECT_ID", "demo"),
            ("EMAIL_API_KEY", "re_123"),
            ("EMAIL_FROM", "Vidgen <noreply@example.com>"),
            ("SITE_BASE_URL", "https://app.example.com"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> WorkerResult<VidgenConfig> {
        VidgenConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.pipeline.storage_host, "media.example.com");
        assert_eq!(config.pipeline.render_timeout, Duration::from_secs(120));
        assert_eq!(config.pipeline.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.pipeline.upload_max_attempts, 3);
        assert_eq!(config.pipeline.upload_attempt_timeout, Duration::from_secs(300));
        assert_eq!(config.pipeline.asset_base_url, "https://app.example.com");
        assert_eq!(config.pipeline.library_url, "https://app.example.com/library");
        assert_eq!(config.r2.region, "auto");
        assert_eq!(config.email.api_base, DEFAULT_EMAIL_API_BASE);
        assert!(config.speech.is_none());
    }

    #[test]
    fn test_all_missing_keys_reported_together() {
        let mut env = base_env();
        env.remove("R2_BUCKET_NAME");
        env.remove("EMAIL_FROM");
        env.remove("GCP_PROJECT_ID");

        let err = load(&env).unwrap_err().to_string();
        assert!(err.contains("R2_BUCKET_NAME"), "{err}");
        assert!(err.contains("EMAIL_FROM"), "{err}");
        assert!(err.contains("GCP_PROJECT_ID or FIREBASE_PROJECT_ID"), "{err}");
    }

    #[test]
    fn test_invalid_numbers_are_reported() {
        let mut env = base_env();
        env.insert("RENDER_TIMEOUT_SECS", "two minutes");
        env.insert("UPLOAD_MAX_ATTEMPTS", "0");

        let err = load(&env).unwrap_err().to_string();
        assert!(err.contains("RENDER_TIMEOUT_SECS"), "{err}");
        assert!(err.contains("UPLOAD_MAX_ATTEMPTS"), "{err}");
    }

    #[test]
    fn test_speech_enabled_by_key() {
        let mut env = base_env();
        env.insert("SPEECH_API_KEY", "xi-key");
        env.insert("SPEECH_DEFAULT_VOICE", "rachel");
        env.insert("REMOTION_LAUNCHER", "bunx remotion");

        let config = load(&env).unwrap();
        let speech = config.speech.unwrap();
        assert_eq!(speech.default_voice.as_deref(), Some("rachel"));
        assert_eq!(config.render.remotion.launcher, vec!["bunx", "remotion"]);
    }

    #[test]
    fn test_firebase_project_fallback() {
        let mut env = base_env();
        env.remove("GCP_PROJECT_ID");
        env.insert("FIREBASE_PROJECT_ID", "fb-demo");
        assert_eq!(load(&env).unwrap().firestore.project_id, "fb-demo");
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_reads_process_environment() {
        for (k, v) in base_env() {
            std::env::set_var(k, v);
        }
        std::env::set_var("QUIZ_MONTHLY_LIMIT", "25");

        let config = VidgenConfig::from_env().unwrap();
        assert_eq!(config.pipeline.quiz_monthly_limit, 25);

        for k in base_env().keys() {
            std::env::remove_var(k);
        }
        std::env::remove_var("QUIZ_MONTHLY_LIMIT");
    }
}
