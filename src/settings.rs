//! Process settings from flags or the environment (after `.env`, when present, is loaded).

use crate::catalog::DEFAULT_SCHEMA;
use crate::config::validator::check_identifier;
use crate::error::ConfigError;
use clap::{builder::BoolishValueParser, error::ErrorKind, ArgAction, Parser};
use std::ffi::OsString;
use std::net::SocketAddr;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/reservas";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Admin backend for space reservations.
#[derive(Parser, Clone, Debug, PartialEq)]
#[command(name = "reserva-admin", version, about)]
pub struct Settings {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Address to listen on
    #[arg(long = "bind", short = 'b', env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: SocketAddr,

    /// Pool size
    #[arg(
        long,
        env = "DATABASE_MAX_CONNECTIONS",
        default_value_t = DEFAULT_MAX_CONNECTIONS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_connections: u32,

    /// Schema holding the reservation tables
    #[arg(long, env = "DATABASE_SCHEMA", default_value = DEFAULT_SCHEMA, value_parser = parse_schema)]
    pub schema: String,

    /// Compare the catalog with `information_schema` before serving
    #[arg(
        long,
        env = "VERIFY_SCHEMA",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub verify_schema: bool,

    /// Largest accepted request body, in bytes
    #[arg(long = "request-body-limit", env = "REQUEST_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,
}

fn parse_schema(raw: &str) -> Result<String, String> {
    check_identifier(raw)
        .map(|_| raw.to_string())
        .map_err(|_| format!("invalid schema name '{}'", raw))
}

impl Settings {
    /// Parse the process arguments and environment. `--help` and `--version` print and exit.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_args(std::env::args_os())
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(settings) => Ok(settings),
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
            Err(e) => Err(ConfigError::Settings(e.to_string())),
        }
    }
}
