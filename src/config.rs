use crate::store::{PostgresConnector, SqliteConnector, StoreConnector};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Sqlite { path: Option<PathBuf> },
    Postgres { database_url: String, max_connections: u32 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub gateway_host: String,
    pub gateway_port: u16,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key/value source. Missing values fall back to
    /// defaults; only an unknown store backend is an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let backend = var("STORE_BACKEND", "sqlite").trim().to_ascii_lowercase();

        let store = match backend.as_str() {
            "sqlite" => {
                let path = var("SQLITE_PATH", "./data/patients.db");
                StoreBackend::Sqlite {
                    path: if path == ":memory:" {
                        None
                    } else {
                        Some(PathBuf::from(path))
                    },
                }
            }
            "postgres" | "postgresql" => {
                // Build database_url from individual fields or use DATABASE_URL if provided
                let database_url = match lookup("DATABASE_URL") {
                    Some(url) => url,
                    None => {
                        let db_host = var("DB_HOST", "localhost");
                        let db_port = var("DB_PORT", "5432");
                        let db_name = var("DB_NAME", "medblocks");
                        let db_user = var("DB_USER", "medblocks");
                        let db_password = var("DB_PASSWORD", "password");

                        // URL-encode password to handle special characters
                        let encoded_password = urlencoding::encode(&db_password);

                        format!(
                            "postgres://{}:{}@{}:{}/{}",
                            db_user, encoded_password, db_host, db_port, db_name
                        )
                    }
                };

                let max_connections = var("MAX_CONNECTIONS", "4").parse().unwrap_or(4);

                StoreBackend::Postgres {
                    database_url,
                    max_connections,
                }
            }
            other => anyhow::bail!(
                "Unknown STORE_BACKEND '{}': expected 'sqlite' or 'postgres'",
                other
            ),
        };

        let gateway_host = var("GATEWAY_HOST", "127.0.0.1");
        let gateway_port = var("GATEWAY_PORT", "8080").parse().unwrap_or(8080);
        let log_dir = PathBuf::from(var("LOG_DIR", "./logs"));

        Ok(Config {
            store,
            gateway_host,
            gateway_port,
            log_dir,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.gateway_host, self.gateway_port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address: {}", e))
    }

    pub fn connector(&self) -> Arc<dyn StoreConnector> {
        match &self.store {
            StoreBackend::Sqlite { path: Some(path) } => Arc::new(SqliteConnector::file(path)),
            StoreBackend::Sqlite { path: None } => Arc::new(SqliteConnector::in_memory()),
            StoreBackend::Postgres {
                database_url,
                max_connections,
            } => Arc::new(PostgresConnector::new(database_url.clone(), *max_connections)),
        }
    }
}
