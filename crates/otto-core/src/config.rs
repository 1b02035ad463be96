//! §6 Configuration (environment-backed) - `OrchestratorConfig`.
//!
//! Loaded the way the teacher's `ServerConfig` is: `dotenvy` for local
//! `.env` files, then the `config` crate layering environment variables over
//! struct defaults. Unlike the teacher's `OPENIBANK__`-prefixed nested
//! sections, spec.md §6 names flat, unprefixed variable names, so we bind
//! those individually rather than through `config::Environment::with_prefix`.

use serde::{Deserialize, Serialize};

use crate::error::{OttoError, OttoResult};

/// Storage backend selector shared by dedupe, session and flood-detector
/// configuration (spec.md §6, §9 "polymorphic stores").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
    /// Document-store backend. The teacher's pack has no Firestore client;
    /// this variant is served by a Postgres-backed document table instead
    /// (see DESIGN.md).
    Firestore,
}

impl StoreBackend {
    fn parse(raw: &str) -> OttoResult<Self> {
        match raw {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "firestore" => Ok(Self::Firestore),
            other => Err(OttoError::Config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Deployment tier. Staging/production refuse `memory` backends at startup
/// (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> OttoResult<Self> {
        match raw {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(OttoError::Config(format!("unknown environment '{other}'"))),
        }
    }

    fn requires_durable_backends(self) -> bool {
        matches!(self, Self::Staging | Self::Production)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmThresholds {
    pub state_selector_threshold: f32,
    pub master_decider_confidence_threshold: f32,
    pub response_generator_min_responses: usize,
}

impl Default for LlmThresholds {
    fn default() -> Self {
        Self {
            state_selector_threshold: 0.7,
            master_decider_confidence_threshold: 0.7,
            response_generator_min_responses: 3,
        }
    }
}

/// Every environment variable in spec.md §6, assembled into one validated
/// struct (spec.md §9 "replace global singletons with explicit configuration
/// records").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub environment: Environment,

    pub whatsapp_verify_token: Option<String>,
    pub whatsapp_webhook_secret: Option<String>,

    pub redis_url: Option<String>,
    pub document_store_url: Option<String>,

    pub dedupe_backend: StoreBackend,
    pub dedupe_ttl_seconds: u64,

    pub session_store_backend: StoreBackend,
    pub session_ttl_seconds: u64,
    pub session_message_history_max_entries: usize,

    pub flood_detector_backend: StoreBackend,
    pub flood_threshold: u32,
    pub flood_ttl_seconds: u64,

    pub decision_audit_backend: StoreBackend,

    pub llm_thresholds: LlmThresholds,

    /// HMAC pepper for `user-key` derivation (§3, §6 Logs).
    pub user_key_pepper: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> OttoResult<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| OttoError::Config(format!("invalid value for {key}: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

impl OrchestratorConfig {
    /// Load from `.env` plus process environment, then validate backend
    /// choices against the deployment tier (spec.md §6: "in staging/
    /// production, any `*_BACKEND=memory` must fail startup").
    pub fn load() -> OttoResult<Self> {
        let _ = dotenvy::dotenv();

        let environment = Environment::parse(&env_or("ENVIRONMENT", "development"))?;

        let config = Self {
            environment,
            whatsapp_verify_token: std::env::var("WHATSAPP_VERIFY_TOKEN").ok(),
            whatsapp_webhook_secret: std::env::var("WHATSAPP_WEBHOOK_SECRET").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            document_store_url: std::env::var("DOCUMENT_STORE_URL").ok(),
            dedupe_backend: StoreBackend::parse(&env_or("DEDUPE_BACKEND", "memory"))?,
            dedupe_ttl_seconds: env_parse("DEDUPE_TTL_SECONDS", 86_400)?,
            session_store_backend: StoreBackend::parse(&env_or("SESSION_STORE_BACKEND", "memory"))?,
            session_ttl_seconds: env_parse("SESSION_TTL_SECONDS", 7_200)?,
            session_message_history_max_entries: env_parse(
                "SESSION_MESSAGE_HISTORY_MAX_ENTRIES",
                200,
            )?,
            flood_detector_backend: StoreBackend::parse(&env_or("FLOOD_DETECTOR_BACKEND", "memory"))?,
            flood_threshold: env_parse("FLOOD_THRESHOLD", 10)?,
            flood_ttl_seconds: env_parse("FLOOD_TTL_SECONDS", 60)?,
            decision_audit_backend: StoreBackend::parse(&env_or("DECISION_AUDIT_BACKEND", "memory"))?,
            llm_thresholds: LlmThresholds {
                state_selector_threshold: env_parse("STATE_SELECTOR_THRESHOLD", 0.7)?,
                master_decider_confidence_threshold: env_parse(
                    "MASTER_DECIDER_CONFIDENCE_THRESHOLD",
                    0.7,
                )?,
                response_generator_min_responses: env_parse(
                    "RESPONSE_GENERATOR_MIN_RESPONSES",
                    3,
                )?,
            },
            user_key_pepper: env_or("USER_KEY_PEPPER", "development-only-insecure-pepper"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> OttoResult<()> {
        if self.environment.requires_durable_backends() {
            for (name, backend) in [
                ("DEDUPE_BACKEND", self.dedupe_backend),
                ("SESSION_STORE_BACKEND", self.session_store_backend),
                ("FLOOD_DETECTOR_BACKEND", self.flood_detector_backend),
                ("DECISION_AUDIT_BACKEND", self.decision_audit_backend),
            ] {
                if backend == StoreBackend::Memory {
                    return Err(OttoError::Config(format!(
                        "{name}=memory is not permitted outside development"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Convenience constructor used by tests and local dev without touching
    /// the process environment.
    pub fn development_defaults() -> Self {
        Self {
            environment: Environment::Development,
            whatsapp_verify_token: None,
            whatsapp_webhook_secret: None,
            redis_url: None,
            document_store_url: None,
            dedupe_backend: StoreBackend::Memory,
            dedupe_ttl_seconds: 86_400,
            session_store_backend: StoreBackend::Memory,
            session_ttl_seconds: 7_200,
            session_message_history_max_entries: 200,
            flood_detector_backend: StoreBackend::Memory,
            flood_threshold: 10,
            flood_ttl_seconds: 60,
            decision_audit_backend: StoreBackend::Memory,
            llm_thresholds: LlmThresholds::default(),
            user_key_pepper: "development-only-insecure-pepper".to_string(),
        }
    }
}
