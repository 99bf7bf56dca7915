//! Command dispatcher (spec §4.7): decodes a command, invokes the
//! matching store operation, and wraps the outcome in a typed result.
//!
//! Grounded on `original_source/src/luxdb/commands.py::Command::execute`
//! and the module-level `execute_command` function: a `Command` either
//! succeeds (`CommandState::Succeeded`) or raises a known domain
//! exception, caught and turned into a `Failed` result — the connection
//! is never torn down over a command failure.

use rand::RngCore;
use tracing::error;

use crate::codec::{Command, CommandResult, ResultData};
use crate::error::LuxError;
use crate::store::Store;

/// Dispatches `command` against `store`, returning a result record the
/// caller encodes and sends back. Domain errors never propagate past
/// this function — they become a `Failed` result instead.
pub async fn dispatch(command: Command, store: &Store) -> CommandResult {
    let outcome = execute(command, store).await;
    match outcome {
        Ok(data) => CommandResult::succeeded(data),
        Err(e) => {
            if matches!(e, LuxError::Internal(_)) {
                error!(error = %e, "unhandled error executing command");
            }
            CommandResult::failed(e)
        }
    }
}

async fn execute(command: Command, store: &Store) -> Result<ResultData, LuxError> {
    match command {
        Command::Connect { payload } => Ok(ResultData::Token(payload)),

        Command::IndexExists { name } => Ok(ResultData::Bool(store.index_exists(&name).await)),

        Command::CreateIndex { name, space, dim } => {
            let created = store.create_index(&name, &space, dim).await?;
            Ok(ResultData::Bool(created))
        }

        Command::InitIndex { name, max_elements, ef_construction, m } => {
            store.init_index(&name, max_elements, ef_construction, m).await?;
            Ok(ResultData::Unit)
        }

        Command::DeleteIndex { name } => {
            store.delete_index(&name).await?;
            Ok(ResultData::Unit)
        }

        Command::AddItems { name, data, ids } => {
            store.add_items(&name, &data, &ids).await?;
            Ok(ResultData::Unit)
        }

        Command::SetEf { name, new_ef } => {
            store.set_ef(&name, new_ef).await?;
            Ok(ResultData::Unit)
        }

        Command::GetEf { name } => Ok(ResultData::Count(store.get_ef(&name).await?)),

        Command::GetEfConstruction { name } => Ok(ResultData::Count(store.get_ef_construction(&name).await?)),

        Command::QueryIndex { name, vectors, k } => {
            let (labels, distances) = store.query_index(&name, &vectors, k).await?;
            Ok(ResultData::Query { labels, distances })
        }

        Command::DeleteItem { name, label } => {
            store.delete_item(&name, label).await?;
            Ok(ResultData::Unit)
        }

        Command::ResizeIndex { name, new_size } => {
            store.resize_index(&name, new_size).await?;
            Ok(ResultData::Unit)
        }

        Command::Count { name } => Ok(ResultData::Count(store.count(&name).await?)),

        Command::MaxElements { name } => Ok(ResultData::Count(store.max_elements(&name).await?)),

        Command::Info { name } => Ok(ResultData::Info(store.info(&name).await?)),

        Command::GetIndexes => Ok(ResultData::Names(store.get_indexes().await)),

        Command::GetItems { name, ids } => Ok(ResultData::Vectors(store.get_items(&name, &ids).await?)),

        Command::GetIds { name } => Ok(ResultData::Ids(store.get_ids(&name).await?)),
    }
}

/// A fresh 32-byte handshake token for `Command::Connect` (spec §4.8,
/// `original_source/src/luxdb/commands.py::ConnectCommand` which uses
/// `secrets.token_bytes()`).
pub fn random_token() -> Vec<u8> {
    let mut bytes = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
