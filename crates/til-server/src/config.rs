use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use til_db::{IntegrityPolicy, ReferentialIntegrity};

/// Server settings, read from `TIL_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub policy: IntegrityPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("TIL_DB_PATH").unwrap_or_else(|| "til.db".into());
        let host = lookup("TIL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("TIL_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("TIL_PORT must be a port number")?;

        let referential = match lookup("TIL_REFERENTIAL_INTEGRITY") {
            Some(raw) => raw.parse::<ReferentialIntegrity>().map_err(|e| anyhow!(e))?,
            None => ReferentialIntegrity::default(),
        };

        let policy = IntegrityPolicy {
            referential,
            enforce_unique_usernames: flag(&lookup, "TIL_UNIQUE_USERNAMES")?,
            dedupe_category_links: flag(&lookup, "TIL_DEDUPE_CATEGORY_LINKS")?,
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            host,
            port,
            policy,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }
}

fn flag<F>(lookup: &F, key: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some(other) => Err(anyhow!("{} must be a boolean, got '{}'", key, other)),
    }
}
