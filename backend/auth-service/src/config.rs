use std::env;

use anyhow::{ensure, Context};

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub cors: CorsConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    /// Access token lifetime in seconds.
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_token_ttl: i64,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Empty host disables outbound mail entirely (codes are logged instead).
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from: String,
    pub use_starttls: bool,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins, or "*" for any.
    pub allowed_origins: String,
    pub max_age: usize,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// When enabled, every refresh issues a new refresh token and revokes the
    /// one that was presented.
    pub rotate_refresh_tokens: bool,
    pub revocation_prune_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            access_secret: env::var("ACCESS_TOKEN_SECRET")
                .context("ACCESS_TOKEN_SECRET must be set")?,
            refresh_secret: env::var("REFRESH_TOKEN_SECRET")
                .context("REFRESH_TOKEN_SECRET must be set")?,
            access_token_ttl: env::var("ACCESS_TOKEN_TTL")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .unwrap_or(900),
            refresh_token_ttl: env::var("REFRESH_TOKEN_TTL")
                .unwrap_or_else(|_| "604800".to_string())
                .parse()
                .unwrap_or(604_800),
        };
        // The two token classes must not be interchangeable.
        ensure!(
            jwt.access_secret != jwt.refresh_secret,
            "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must be different values"
        );

        Ok(Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("APP_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            jwt,
            email: EmailConfig {
                smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
                smtp_port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .unwrap_or(587),
                smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
                smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                smtp_from: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "no-reply@gatehouse.dev".to_string()),
                use_starttls: env::var("SMTP_STARTTLS")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .unwrap_or(true),
            },
            cors: CorsConfig {
                allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                max_age: env::var("CORS_MAX_AGE")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            },
            session: SessionConfig {
                rotate_refresh_tokens: env::var("ROTATE_REFRESH_TOKENS")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                revocation_prune_interval_secs: env::var("REVOCATION_PRUNE_INTERVAL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_required_vars() {
        env::set_var("DATABASE_URL", "postgres://localhost/auth_test");
        env::set_var("ACCESS_TOKEN_SECRET", "access-secret-for-tests");
        env::set_var("REFRESH_TOKEN_SECRET", "refresh-secret-for-tests");
    }

    fn clear_vars() {
        for key in [
            "DATABASE_URL",
            "ACCESS_TOKEN_SECRET",
            "REFRESH_TOKEN_SECRET",
            "APP_ENV",
            "APP_PORT",
            "ACCESS_TOKEN_TTL",
            "ROTATE_REFRESH_TOKENS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_vars();
        set_required_vars();

        let config = Config::from_env().unwrap();
        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.jwt.access_token_ttl, 900);
        assert_eq!(config.jwt.refresh_token_ttl, 604_800);
        assert_eq!(config.email.smtp_port, 587);
        assert!(!config.session.rotate_refresh_tokens);
        assert!(!config.is_production());

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_vars();
        set_required_vars();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_PORT", "9090");
        env::set_var("ACCESS_TOKEN_TTL", "30");
        env::set_var("ROTATE_REFRESH_TOKENS", "true");

        let config = Config::from_env().unwrap();
        assert!(config.is_production());
        assert_eq!(config.app.port, 9090);
        assert_eq!(config.jwt.access_token_ttl, 30);
        assert!(config.session.rotate_refresh_tokens);

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_requires_database_url() {
        clear_vars();
        env::set_var("ACCESS_TOKEN_SECRET", "access-secret-for-tests");
        env::set_var("REFRESH_TOKEN_SECRET", "refresh-secret-for-tests");

        let result = Config::from_env();
        assert!(result.is_err());

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_shared_secret() {
        clear_vars();
        env::set_var("DATABASE_URL", "postgres://localhost/auth_test");
        env::set_var("ACCESS_TOKEN_SECRET", "same-secret");
        env::set_var("REFRESH_TOKEN_SECRET", "same-secret");

        let result = Config::from_env();
        assert!(result.is_err());

        clear_vars();
    }
}
