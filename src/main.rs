//! LuxDB server binary (spec §6.1): `server --host H --port P
//! [--loglevel L] [--secret S] <path>`.
//!
//! Grounded on `original_source/src/luxdb/server.py::main`/`serve`
//! (argparse surface, `asyncio.run`, per-signal shutdown) and the
//! teacher's own `clap`-derived `Args` + `tracing_subscriber` bootstrap.

use clap::Parser;
use luxdb::config::{Args, CodecConfig, ServerConfig};
use luxdb::crypto::{derive_key, Token};
use luxdb::server::Server;
use luxdb::store::Store;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = ServerConfig::from_args(args);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(config.tracing_directive())
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let store = match Store::open(&config.path) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, path = %config.path.display(), "failed to open store");
            std::process::exit(1);
        }
    };

    let codec_config = CodecConfig::from_env();
    let key = derive_key(&config.secret, &codec_config.salt, codec_config.iterations);
    info!(key_fingerprint = %hex::encode(&key[..4]), "derived codec key");
    let token = Token::new(key, codec_config.ttl_secs);

    let server = Server::new(config.host.clone(), config.port, store, token);
    let (listener, addr) = match server.bind().await {
        Ok(bound) => bound,
        Err(e) => {
            error!(error = %e, host = %config.host, "failed to bind listening socket");
            std::process::exit(1);
        }
    };

    info!(%addr, "luxdb-server listening");
    server.serve(listener).await;
}
