use chrono::{Duration, Utc};
use std::env;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Deployment mode. Development exposes internal error details to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub jwt_cookie_expires_in_days: i64,
    pub environment: Environment,
    pub frontend_url: String,
    pub bcrypt_cost: u32,
    pub cors_allowed_origins: Vec<String>,
}

const DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:19006",
    "http://127.0.0.1:19006",
];

const PROD_ORIGINS: &[&str] = &["http://localhost:5173"];

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let environment = match get("APP_ENV").as_deref() {
            None | Some("production") => Environment::Production,
            Some("development") => Environment::Development,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "APP_ENV",
                    value: other.to_string(),
                })
            }
        };

        // Lifetimes must still yield a representable expiry when added to now.
        let jwt_expires_in = match get("JWT_EXPIRES_IN") {
            Some(raw) => parse_duration(&raw)
                .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
                .ok_or(ConfigError::Invalid {
                    var: "JWT_EXPIRES_IN",
                    value: raw,
                })?,
            None => Duration::days(1),
        };

        let jwt_cookie_expires_in_days: i64 =
            parse_or(get("JWT_COOKIE_EXPIRES_IN"), "JWT_COOKIE_EXPIRES_IN", 1)?;
        if jwt_cookie_expires_in_days <= 0
            || Duration::try_days(jwt_cookie_expires_in_days).is_none()
        {
            return Err(ConfigError::Invalid {
                var: "JWT_COOKIE_EXPIRES_IN",
                value: jwt_cookie_expires_in_days.to_string(),
            });
        }

        let cors_allowed_origins = match get("CORS_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            None => {
                let defaults = if environment.is_development() {
                    DEV_ORIGINS
                } else {
                    PROD_ORIGINS
                };
                defaults.iter().map(|origin| origin.to_string()).collect()
            }
        };

        Ok(Self {
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            server_port: parse_or(get("SERVER_PORT"), "SERVER_PORT", 8080)?,
            server_host: get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expires_in,
            jwt_cookie_expires_in_days,
            environment,
            frontend_url: get("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string())
                .trim_end_matches('/')
                .to_string(),
            bcrypt_cost: parse_or(get("BCRYPT_COST"), "BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            cors_allowed_origins,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

/// Parses `90`, `90s`, `15m`, `12h` or `7d`. A bare number is seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (amount, unit) = raw.split_at(split);
    let amount: i64 = amount.parse().ok()?;
    if amount <= 0 {
        return None;
    }

    match unit.trim() {
        "" | "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.database.url, "postgres://test");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.jwt_expires_in, Duration::days(1));
        assert_eq!(config.jwt_cookie_expires_in_days, 1);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_config_custom_values() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", "secret"),
            ("SERVER_PORT", "3000"),
            ("SERVER_HOST", "0.0.0.0"),
            ("JWT_EXPIRES_IN", "12h"),
            ("APP_ENV", "development"),
            ("FRONTEND_URL", "https://app.example.com/"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example.com, https://b.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.jwt_expires_in, Duration::hours(12));
        assert!(config.environment.is_development());
        assert_eq!(config.frontend_url, "https://app.example.com");
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }

    #[test]
    fn test_config_missing_and_invalid() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://test")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", "secret"),
            ("SERVER_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SERVER_PORT", .. }));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90"), Some(Duration::seconds(90)));
        assert_eq!(parse_duration("15m"), Some(Duration::minutes(15)));
        assert_eq!(parse_duration("7d"), Some(Duration::days(7)));
        assert_eq!(parse_duration("0d"), None);
        assert_eq!(parse_duration("1w"), None);
        assert_eq!(parse_duration("d"), None);
        assert_eq!(parse_duration("99999999999999d"), None);
        assert_eq!(parse_duration("99999999999999999999"), None);
    }

    #[test]
    fn test_out_of_range_lifetimes_are_invalid() {
        let base = [("DATABASE_URL", "postgres://test"), ("JWT_SECRET", "secret")];

        let err = Config::from_lookup(lookup(&[base[0], base[1], ("JWT_EXPIRES_IN", "99999999999999d")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "JWT_EXPIRES_IN", .. }));

        // Representable as a duration, but not once added to the current time.
        let err = Config::from_lookup(lookup(&[base[0], base[1], ("JWT_EXPIRES_IN", "100000000000d")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "JWT_EXPIRES_IN", .. }));

        for days in ["99999999999999", "0", "-3"] {
            let err = Config::from_lookup(lookup(&[base[0], base[1], ("JWT_COOKIE_EXPIRES_IN", days)]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { var: "JWT_COOKIE_EXPIRES_IN", .. }),
                "{}",
                days
            );
        }
    }
}
