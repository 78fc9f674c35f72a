use std::{env, str::FromStr};

use musicroom_collab::CollabConfig;
use musicroom_server::DEFAULT_PORT;

use crate::MusicroomError;

const SERVER_PORT: &str = "MUSICROOM_SERVER_PORT";
const DATABASE_URL: &str = "DATABASE_URL";
const DATABASE_MAX_CONNECTIONS: &str = "MUSICROOM_DATABASE_MAX_CONNECTIONS";
const DEFAULT_MAX_MEMBERS: &str = "MUSICROOM_DEFAULT_MAX_MEMBERS";

/// Settings read from the environment at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Postgres connection string, the in-memory store is used when unset
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub default_max_members: i32,
}

impl Config {
    pub fn from_env() -> Result<Self, MusicroomError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, MusicroomError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL).filter(|url| !url.trim().is_empty());
        let default_max_members = parse(&lookup, DEFAULT_MAX_MEMBERS, 50)?;

        if default_max_members < 1 {
            return Err(MusicroomError::Config(format!(
                "{} must be at least 1",
                DEFAULT_MAX_MEMBERS
            )));
        }

        Ok(Self {
            port: parse(&lookup, SERVER_PORT, DEFAULT_PORT)?,
            database_url,
            max_connections: parse(&lookup, DATABASE_MAX_CONNECTIONS, 5)?,
            default_max_members,
        })
    }

    pub fn collab(&self) -> CollabConfig {
        CollabConfig {
            default_max_members: self.default_max_members,
        }
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T, MusicroomError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| MusicroomError::Config(format!("{} is invalid: {}", key, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, MusicroomError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, None);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.collab().default_max_members, 50);
    }

    #[test]
    fn values_are_read() {
        let config = config(&[
            (SERVER_PORT, "8080"),
            (DATABASE_URL, "postgres://localhost/musicroom"),
            (DATABASE_MAX_CONNECTIONS, " 12 "),
            (DEFAULT_MAX_MEMBERS, "10"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/musicroom")
        );
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.default_max_members, 10);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let error = config(&[(SERVER_PORT, "ninety")]).unwrap_err();
        assert!(error.to_string().contains(SERVER_PORT));

        let error = config(&[(DEFAULT_MAX_MEMBERS, "0")]).unwrap_err();
        assert!(error.to_string().contains(DEFAULT_MAX_MEMBERS));
    }

    #[test]
    fn empty_database_url_means_memory() {
        assert_eq!(config(&[(DATABASE_URL, "  ")]).unwrap().database_url, None);
    }
}
