//! Server and codec configuration.
//!
//! Mirrors `original_source/src/luxdb/server.py::main` (argparse surface,
//! `LUXDB_SECRET` env fallback) and `connection.py`'s module-level KDF/TTL
//! constants (`LUXDB_SALT`, `KDF_ITERATIONS`, `FERNET_TTL`).

use clap::Parser;
use std::path::PathBuf;

const DEFAULT_SALT: &[u8] = b"wYfJIy4Nx1hPcxiljwg";
const DEFAULT_ITERATIONS: u32 = 1 << 18;
const DEFAULT_TTL_SECS: u64 = 60;

/// CLI arguments for the server binary: `server --host H --port P [--loglevel L] [--secret S] <path>`.
#[derive(Parser, Debug)]
#[command(name = "luxdb-server", version, about = "LuxDB: multidimensional vector database server")]
pub struct Args {
    /// Host where the server should listen.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on. Chosen by the OS if omitted.
    #[arg(long)]
    pub port: Option<u16>,

    /// Logging level, e.g. --loglevel debug.
    #[arg(short = 'l', long = "loglevel", default_value = "warning")]
    pub loglevel: String,

    /// Shared secret; falls back to $LUXDB_SECRET if unset.
    #[arg(long)]
    pub secret: Option<String>,

    /// Path where the database is stored or should be stored.
    pub path: PathBuf,
}

/// Host/port/secret/path the server actually runs with, once env fallback is resolved.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: Option<u16>,
    pub loglevel: String,
    pub secret: String,
    pub path: PathBuf,
}

impl ServerConfig {
    pub fn from_args(args: Args) -> Self {
        let secret = args
            .secret
            .unwrap_or_else(|| std::env::var("LUXDB_SECRET").unwrap_or_default());

        Self {
            host: args.host,
            port: args.port,
            loglevel: args.loglevel,
            secret,
            path: args.path,
        }
    }

    /// `loglevel` as a valid `tracing_subscriber::EnvFilter` directive.
    ///
    /// The CLI surface accepts Python `logging`-style level names (the
    /// original's `--loglevel warning`, per `server.py::main`'s
    /// `args.loglevel.upper()`), but `EnvFilter` has no `warning` level —
    /// only `error`/`warn`/`info`/`debug`/`trace`. An unrecognized name is
    /// not an `EnvFilter` parse error, it's a *target* directive, so
    /// `"warning"` silently enables TRACE for a target literally named
    /// `warning` and disables everything else. Map the Python names onto
    /// their tracing equivalents before handing them to `EnvFilter`.
    pub fn tracing_directive(&self) -> String {
        match self.loglevel.to_ascii_lowercase().as_str() {
            "warning" => "warn".to_string(),
            "critical" => "error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Parameters for the PBKDF2 key derivation and AEAD token TTL.
///
/// Constructible purely in memory (no environment access) so tests don't
/// need to fight over process-global env vars.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub ttl_secs: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CodecConfig {
    /// Build config from environment, falling back to the compiled-in defaults.
    pub fn from_env() -> Self {
        let salt = std::env::var("LUXDB_SALT")
            .map(|s| s.into_bytes())
            .unwrap_or_else(|_| DEFAULT_SALT.to_vec());

        let iterations = std::env::var("KDF_ITERATIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_ITERATIONS);

        let ttl_secs = std::env::var("FERNET_TTL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_TTL_SECS);

        Self { salt, iterations, ttl_secs }
    }

    /// Config with the compiled-in defaults, ignoring the environment entirely.
    pub fn defaults() -> Self {
        Self {
            salt: DEFAULT_SALT.to_vec(),
            iterations: DEFAULT_ITERATIONS,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}
