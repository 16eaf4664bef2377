use std::env;
use std::sync::OnceLock;

/// Process-wide AAA settings, read from the environment once at
/// initialization and immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AaaConfig {
    /// Authority location reported to peers and to the external handler.
    pub authority: Option<String>,
    /// Application protocol this endpoint declares in the exchange.
    pub protocol: Option<String>,
    /// Path of the external authority handler executable.
    pub handler: Option<String>,
    pub group: Option<String>,
    pub role: Option<String>,
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl AaaConfig {
    /// Read the `OPENAAA_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            authority: env_nonempty("OPENAAA_AUTHORITY"),
            protocol: env_nonempty("OPENAAA_PROTOCOL"),
            handler: env_nonempty("OPENAAA_HANDLER"),
            group: env_nonempty("OPENAAA_GROUP"),
            role: env_nonempty("OPENAAA_ROLE"),
        }
    }

    /// Process-wide snapshot, loaded on first call. Idempotent; later
    /// environment changes are not observed.
    pub fn global() -> &'static AaaConfig {
        static CONFIG: OnceLock<AaaConfig> = OnceLock::new();
        CONFIG.get_or_init(AaaConfig::from_env)
    }
}
