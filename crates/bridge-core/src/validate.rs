//! Pre-flight configuration validation.
//!
//! The validator is a pure function: it never fails, never touches shared
//! state, and reports every problem it finds rather than stopping at the
//! first one. The bridge refuses to leave `STOPPED` while the report is
//! not clean.

use url::Url;

use crate::config::EngineConfig;

/// Pool endpoint schemes the bridge will connect with.
pub const ACCEPTED_SCHEMES: [&str; 4] = ["stratum+tcp", "stratum+ssl", "tcp", "ssl"];

/// Outcome of validating a configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Human-readable rejection reasons. Empty means the config passed.
    pub reasons: Vec<String>,
}

impl ValidationReport {
    /// True when no problems were found.
    pub fn is_ok(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// Validate an engine configuration for start/update acceptance.
pub fn validate_config(cfg: &EngineConfig) -> ValidationReport {
    let mut reasons = Vec::new();

    check_endpoint(&cfg.pool_url, &mut reasons);

    if cfg.username.trim().is_empty() {
        reasons.push("username must not be empty".to_string());
    }
    if cfg.password.is_empty() && !cfg.allow_anonymous {
        reasons.push("password is empty and the pool does not allow anonymous auth".to_string());
    }

    if cfg.algorithm.trim().is_empty() {
        reasons.push("algorithm identifier must not be empty".to_string());
    }

    let sec = &cfg.security;
    if sec.enable_secure_connection
        && !sec.validate_certificates
        && !is_well_formed_fingerprint(&sec.certificate_fingerprint)
    {
        reasons.push(
            "secure connection requires a pinned certificate fingerprint \
             or default CA validation"
                .to_string(),
        );
    }

    ValidationReport { reasons }
}

fn check_endpoint(endpoint: &str, reasons: &mut Vec<String>) {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        reasons.push("pool endpoint must not be empty".to_string());
        return;
    }

    if endpoint.contains("://") {
        match Url::parse(endpoint) {
            Ok(url) => {
                if !ACCEPTED_SCHEMES.contains(&url.scheme()) {
                    reasons.push(format!("unsupported pool scheme: {}", url.scheme()));
                }
                if url.host_str().map(str::is_empty).unwrap_or(true) {
                    reasons.push("pool endpoint is missing a host".to_string());
                }
                if url.port().is_none() {
                    reasons.push("pool endpoint is missing a port".to_string());
                }
            }
            Err(err) => reasons.push(format!("invalid pool endpoint: {err}")),
        }
        return;
    }

    let Some((host, port)) = endpoint.rsplit_once(':') else {
        reasons.push("pool endpoint must be host:port".to_string());
        return;
    };
    if host.is_empty() {
        reasons.push("pool endpoint is missing a host".to_string());
    }
    match port.parse::<u32>() {
        Ok(0) => reasons.push("pool port must not be 0".to_string()),
        Ok(p) if p > u16::MAX as u32 => reasons.push(format!("pool port out of range: {p}")),
        Ok(_) => {}
        Err(_) => reasons.push(format!("pool port is not numeric: {port}")),
    }
}

fn is_well_formed_fingerprint(fingerprint: &str) -> bool {
    let hex: String = fingerprint.chars().filter(|c| *c != ':').collect();
    hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;

    fn base_config() -> EngineConfig {
        EngineConfig {
            pool_url: "pool.example.com:3333".to_string(),
            username: "alice".to_string(),
            password: "x".to_string(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn accepts_well_formed_host_port() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn accepts_stratum_uri() {
        let cfg = EngineConfig {
            pool_url: "stratum+tcp://pool.example.com:3333".to_string(),
            ..base_config()
        };
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_empty_host() {
        let cfg = EngineConfig {
            pool_url: String::new(),
            ..base_config()
        };
        let report = validate_config(&cfg);
        assert!(!report.is_ok());

        let cfg = EngineConfig {
            pool_url: ":3333".to_string(),
            ..base_config()
        };
        assert!(!validate_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_bad_ports() {
        for endpoint in ["pool.example.com:0", "pool.example.com:-1", "pool.example.com:70000", "pool.example.com:abc"] {
            let cfg = EngineConfig {
                pool_url: endpoint.to_string(),
                ..base_config()
            };
            assert!(!validate_config(&cfg).is_ok(), "should reject {endpoint}");
        }
    }

    #[test]
    fn rejects_unknown_scheme() {
        let cfg = EngineConfig {
            pool_url: "http://pool.example.com:3333".to_string(),
            ..base_config()
        };
        assert!(!validate_config(&cfg).is_ok());
    }

    #[test]
    fn empty_password_requires_anonymous_policy() {
        let mut cfg = EngineConfig {
            password: String::new(),
            ..base_config()
        };
        assert!(!validate_config(&cfg).is_ok());

        cfg.allow_anonymous = true;
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn empty_username_is_rejected() {
        let cfg = EngineConfig {
            username: "  ".to_string(),
            ..base_config()
        };
        assert!(!validate_config(&cfg).is_ok());
    }

    #[test]
    fn secure_connection_needs_pin_or_ca_validation() {
        let mut cfg = base_config();
        cfg.security = SecurityConfig {
            enable_secure_connection: true,
            validate_certificates: false,
            certificate_fingerprint: String::new(),
            ..SecurityConfig::default()
        };
        assert!(!validate_config(&cfg).is_ok());

        cfg.security.certificate_fingerprint = "ab".repeat(32);
        assert!(validate_config(&cfg).is_ok());

        // Colon separators are accepted.
        cfg.security.certificate_fingerprint = vec!["ab"; 32].join(":");
        assert!(validate_config(&cfg).is_ok());

        cfg.security.certificate_fingerprint = String::new();
        cfg.security.validate_certificates = true;
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn malformed_fingerprint_is_rejected() {
        let mut cfg = base_config();
        cfg.security.validate_certificates = false;
        cfg.security.certificate_fingerprint = "not-a-fingerprint".to_string();
        assert!(!validate_config(&cfg).is_ok());
    }

    #[test]
    fn reports_collect_all_reasons() {
        let cfg = EngineConfig {
            pool_url: String::new(),
            username: String::new(),
            password: String::new(),
            ..EngineConfig::default()
        };
        let report = validate_config(&cfg);
        assert!(report.reasons.len() >= 3);
    }
}
