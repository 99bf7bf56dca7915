//! Reference client drivers (spec §2, "Clients"): async and synchronous
//! request/response implementations mirroring the protocol, test-grade
//! but fully functional.
//!
//! Grounded directly on `original_source/src/luxdb/client.py::Client` and
//! `original_source/src/luxdb/sync_client.py::SyncClient`.

mod asynchronous;
mod synchronous;

pub use asynchronous::{Client, ClientError};
pub use synchronous::SyncClient;
