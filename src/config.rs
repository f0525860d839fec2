use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

/// Identity provider settings used to validate bearer tokens.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub domain: String,
    pub audience: String,
    pub jwks_url: String,
    /// Local JWKS document; when set, no keys are fetched over the network.
    pub jwks_file: Option<String>,
    /// Upper bound on a single JWKS fetch.
    pub jwks_timeout: Duration,
    /// How long a fetched JWKS is trusted before it is fetched again.
    pub jwks_max_age: Duration,
}

impl AuthConfig {
    /// Issuer the provider writes into `iss`, e.g. `https://tenant.auth0.com/`.
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageKind,
    pub database_url: Option<String>,
    pub auth: AuthConfig,
    /// Drop and recreate the drinks table on startup. Destroys data.
    pub reset_db: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage = match std::env::var("STORAGE").as_deref() {
            Ok("memory") => StorageKind::Memory,
            Ok("postgres") | Err(_) => StorageKind::Postgres,
            Ok(other) => anyhow::bail!("unknown STORAGE value: {other}"),
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if storage == StorageKind::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORAGE=postgres");
        }

        let domain = std::env::var("AUTH0_DOMAIN").context("AUTH0_DOMAIN")?;
        let audience = std::env::var("API_AUDIENCE").context("API_AUDIENCE")?;
        let jwks_url = std::env::var("JWKS_URL").unwrap_or_else(|_| {
            format!(
                "https://{}/.well-known/jwks.json",
                domain.trim_end_matches('/')
            )
        });

        let jwks_file = std::env::var("JWKS_FILE").ok();
        let jwks_timeout = secs_var("JWKS_TIMEOUT_SECS", 5)?;
        let jwks_max_age = secs_var("JWKS_MAX_AGE_SECS", 600)?;

        let reset_db = std::env::var("RESET_DB")
            .ok()
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Ok(Self {
            storage,
            database_url,
            auth: AuthConfig {
                domain,
                audience,
                jwks_url,
                jwks_file,
                jwks_timeout,
                jwks_max_age,
            },
            reset_db,
        })
    }
}

fn secs_var(name: &str, default: u64) -> anyhow::Result<Duration> {
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Duration::from_secs)
            .with_context(|| format!("{name} must be a number of seconds")),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_has_single_trailing_slash() {
        let auth = AuthConfig {
            domain: "tenant.eu.auth0.com/".into(),
            audience: "drinks".into(),
            jwks_url: String::new(),
            jwks_file: None,
            jwks_timeout: Duration::from_secs(5),
            jwks_max_age: Duration::from_secs(600),
        };
        assert_eq!(auth.issuer(), "https://tenant.eu.auth0.com/");
    }

    #[test]
    fn jwks_durations_read_seconds() {
        assert_eq!(
            secs_var("COFFEESHOP_TEST_UNSET_SECS", 7).unwrap(),
            Duration::from_secs(7)
        );
        std::env::set_var("COFFEESHOP_TEST_MAX_AGE_SECS", " 30 ");
        assert_eq!(
            secs_var("COFFEESHOP_TEST_MAX_AGE_SECS", 600).unwrap(),
            Duration::from_secs(30)
        );
        std::env::set_var("COFFEESHOP_TEST_BAD_SECS", "ten");
        assert!(secs_var("COFFEESHOP_TEST_BAD_SECS", 5).is_err());
    }

    #[test]
    fn reset_flag_is_opt_in() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("maybe"));
    }
}
