//! Engine configuration records and their on-disk persistence.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Security-related connection settings.
///
/// The live "security enabled" toggle is deliberately not part of this
/// record: it can be flipped at runtime without a reconfigure, so the
/// bridge keeps it as a separate atomic next to the stored config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require a TLS-wrapped pool connection.
    #[serde(default = "default_true")]
    pub enable_secure_connection: bool,
    /// Validate the pool certificate against the default CA store.
    #[serde(default = "default_true")]
    pub validate_certificates: bool,
    /// Encrypt locally cached credentials.
    #[serde(default = "default_true")]
    pub enable_encryption: bool,
    /// Pinned certificate fingerprint (hex SHA-256, `:` separators allowed).
    /// Empty means no pin.
    #[serde(default)]
    pub certificate_fingerprint: String,
}

fn default_true() -> bool {
    true
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_secure_connection: true,
            validate_certificates: true,
            enable_encryption: true,
            certificate_fingerprint: String::new(),
        }
    }
}

/// Full engine configuration.
///
/// The bridge owns exactly one live copy; callers always receive and
/// submit detached copies, and an update replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pool endpoint: `host:port`, or a URI with one of the accepted
    /// schemes (`stratum+tcp`, `stratum+ssl`, `tcp`, `ssl`).
    pub pool_url: String,
    /// Principal identifier sent to the pool.
    pub username: String,
    /// Pool secret. May be empty only when [`Self::allow_anonymous`] is set.
    #[serde(default)]
    pub password: String,
    /// The pool explicitly allows anonymous authentication.
    #[serde(default)]
    pub allow_anonymous: bool,
    /// Compute thread count. `0` means auto-detect at start time.
    #[serde(default)]
    pub threads: u32,
    /// Scheduling priority hint for the compute workload.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Prefer large-page memory for the workload.
    #[serde(default)]
    pub huge_pages: bool,
    /// Keep computing while the host application is backgrounded.
    #[serde(default = "default_true")]
    pub background_mode: bool,
    /// Algorithm identifier handed to the compute backend.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Connection security settings.
    #[serde(default)]
    pub security: SecurityConfig,
}

fn default_priority() -> u32 {
    1
}

fn default_algorithm() -> String {
    "sha256".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_url: String::new(),
            username: String::new(),
            password: String::new(),
            allow_anonymous: false,
            threads: 0,
            priority: 1,
            huge_pages: false,
            background_mode: true,
            algorithm: default_algorithm(),
            security: SecurityConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Trim whitespace from the string fields.
    pub fn normalize(&mut self) {
        self.pool_url = self.pool_url.trim().to_string();
        self.username = self.username.trim().to_string();
        self.algorithm = self.algorithm.trim().to_ascii_lowercase();
        self.security.certificate_fingerprint =
            self.security.certificate_fingerprint.trim().to_string();
    }
}

fn xdg_config_home() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
        let dir = PathBuf::from(dir);
        if dir.as_os_str().is_empty() {
            anyhow::bail!("XDG_CONFIG_HOME is set but empty");
        }
        return Ok(dir);
    }

    let home = std::env::var_os("HOME").ok_or_else(|| anyhow::anyhow!("HOME is not set"))?;
    let home = PathBuf::from(home);
    if home.as_os_str().is_empty() {
        anyhow::bail!("HOME is set but empty");
    }
    Ok(home.join(".config"))
}

/// Path of the saved engine configuration.
pub fn engine_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_home()?.join("emberhost").join("config.json"))
}

/// Load the saved engine configuration, if one exists.
pub fn load_engine_config() -> anyhow::Result<Option<EngineConfig>> {
    let path = engine_config_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)?;
    let mut cfg: EngineConfig = serde_json::from_str(&raw)?;
    cfg.normalize();
    Ok(Some(cfg))
}

/// Persist the engine configuration (atomic tmp-file + rename).
pub fn save_engine_config(cfg: &EngineConfig) -> anyhow::Result<()> {
    let path = engine_config_path()?;
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid config path: {}", path.display()))?;
    std::fs::create_dir_all(dir)?;

    let mut cfg = cfg.clone();
    cfg.normalize();

    let json = serde_json::to_string_pretty(&cfg)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        let mut cfg = EngineConfig {
            pool_url: "  pool.example.com:3333 ".to_string(),
            username: " alice ".to_string(),
            algorithm: " SHA256 ".to_string(),
            ..EngineConfig::default()
        };
        cfg.normalize();
        assert_eq!(cfg.pool_url, "pool.example.com:3333");
        assert_eq!(cfg.username, "alice");
        assert_eq!(cfg.algorithm, "sha256");
    }

    #[test]
    fn config_json_round_trip() {
        let cfg = EngineConfig {
            pool_url: "stratum+ssl://pool.example.com:3333".to_string(),
            username: "alice".to_string(),
            password: "x".to_string(),
            threads: 4,
            ..EngineConfig::default()
        };
        let json = serde_json::to_string(&cfg).expect("serialize");
        let back: EngineConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, cfg);
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{"pool_url":"pool.example.com:3333","username":"alice"}"#,
        )
        .expect("deserialize");
        assert_eq!(cfg.threads, 0);
        assert_eq!(cfg.priority, 1);
        assert_eq!(cfg.algorithm, "sha256");
        assert!(cfg.background_mode);
        assert!(cfg.security.enable_secure_connection);
    }
}
