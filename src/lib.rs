//! LuxDB: a multi-tenant approximate nearest neighbor vector database
//! server, network-accessible over a framed, authenticated TCP protocol.
//!
//! Module map (leaves first, per the layered design):
//! `ann` → `index` → `concurrency` → `persistence` → `store` → `codec`
//! + `frame` → `dispatch` → `server`, with `client` as the reference
//! driver for both.

pub mod ann;
pub mod client;
pub mod codec;
pub mod concurrency;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod index;
pub mod persistence;
pub mod server;
pub mod store;

pub use client::{Client, SyncClient};
pub use config::{CodecConfig, ServerConfig};
pub use error::{LuxError, LuxResult, TransportError, TransportResult};
pub use server::{Server, ServerState};
pub use store::Store;
