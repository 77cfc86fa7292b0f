//! Connexion PostgreSQL : paramètres, TLS et pool
//!
//! Un import n'utilise qu'une connexion; le pool sert surtout à borner les
//! délais d'attente et de création.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Object, Pool, PoolConfig, Runtime, Timeouts};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;

/// Valeur de `--ssl` / `PGSSLMODE`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl SslMode {
    fn uses_tls(self) -> bool {
        !matches!(self, SslMode::Disable)
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" | "off" | "false" => Ok(SslMode::Disable),
            "prefer" | "allow" => Ok(SslMode::Prefer),
            "require" | "on" | "true" => Ok(SslMode::Require),
            other => Err(format!(
                "Unknown SSL mode '{}' (expected disable, prefer or require)",
                other
            )),
        }
    }
}

/// Paramètres de connexion
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    /// Taille maximale du pool (1 pour un import séquentiel)
    pub pool_size: usize,
    pub ssl_mode: SslMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5433,
            dbname: "montreal".into(),
            user: "montreal".into(),
            password: Some("montreal".into()),
            pool_size: 1,
            ssl_mode: SslMode::Disable,
        }
    }
}

/// Variable d'environnement parsée; absente ou invalide = None
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl DatabaseConfig {
    /// Variables libpq usuelles (`PGHOST`, `PGPORT`...), sinon valeurs par défaut
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = env::var("PGHOST") {
            config.host = host;
        }
        if let Some(port) = env_parse("PGPORT") {
            config.port = port;
        }
        if let Ok(dbname) = env::var("PGDATABASE") {
            config.dbname = dbname;
        }
        if let Ok(user) = env::var("PGUSER") {
            config.user = user;
        }
        if let Ok(password) = env::var("PGPASSWORD") {
            config.password = Some(password);
        }
        if let Some(size) = env_parse::<usize>("POOL_SIZE").filter(|&n| n > 0) {
            config.pool_size = size;
        }
        if let Some(mode) = env_parse("PGSSLMODE") {
            config.ssl_mode = mode;
        }
        config
    }

    /// Cible affichée à l'utilisateur (sans mot de passe)
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.dbname)
    }

    fn deadpool_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = self.password.clone();
        cfg.pool = Some(PoolConfig {
            max_size: self.pool_size,
            timeouts: Timeouts {
                wait: Some(Duration::from_secs(30)),
                create: Some(Duration::from_secs(10)),
                recycle: Some(Duration::from_secs(30)),
            },
            ..Default::default()
        });
        cfg
    }
}

/// Racines webpki, sans certificat client
fn rustls_connector() -> MakeRustlsConnect {
    let roots = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    MakeRustlsConnect::new(tls)
}

/// Crée le pool; aucune connexion n'est ouverte avant le premier `get`
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let cfg = config.deadpool_config();
    let pool = if config.ssl_mode.uses_tls() {
        cfg.create_pool(Some(Runtime::Tokio1), rustls_connector())
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
    };
    pool.with_context(|| format!("Failed to create pool for {}", config.display_target()))
}

/// Ouvre la connexion unique utilisée par un import
pub async fn connect(pool: &Pool) -> Result<Object> {
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    client
        .execute("SELECT 1", &[])
        .await
        .context("Connection test failed")?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_parse() {
        assert_eq!("disable".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert_eq!(" PREFER ".parse::<SslMode>().unwrap(), SslMode::Prefer);
        assert_eq!("on".parse::<SslMode>().unwrap(), SslMode::Require);
        assert!("verify-full".parse::<SslMode>().is_err());
        assert!(SslMode::Require.uses_tls());
        assert!(!SslMode::Disable.uses_tls());
    }

    #[test]
    fn test_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.display_target(), "localhost:5433/montreal");
        assert_eq!(config.user, "montreal");
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.ssl_mode, SslMode::Disable);
    }

    #[test]
    fn test_deadpool_config() {
        let config = DatabaseConfig {
            host: "db".into(),
            port: 5432,
            ..Default::default()
        };
        let cfg = config.deadpool_config();
        assert_eq!(cfg.host.as_deref(), Some("db"));
        assert_eq!(cfg.port, Some(5432));
        assert_eq!(cfg.pool.map(|p| p.max_size), Some(1));
    }
}
