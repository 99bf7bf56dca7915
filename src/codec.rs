//! Typed command/result records and their encrypted wire encoding (spec §4.1, §6.2, §6.3).
//!
//! Grounded on `original_source/src/luxdb/commands.py` (the `Command`
//! variants and `CommandState` enum) and `connection.py::pack_obj`/
//! `receive_obj` (pickle-then-encrypt, replaced here with postcard, which
//! is bit-stable and doesn't need a schema registry).

use serde::{Deserialize, Serialize};

use crate::crypto::Token;
use crate::error::{LuxError, TransportError};
use crate::index::IndexInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    Connect { payload: Vec<u8> },
    IndexExists { name: String },
    CreateIndex { name: String, space: String, dim: usize },
    InitIndex { name: String, max_elements: usize, ef_construction: usize, m: usize },
    DeleteIndex { name: String },
    AddItems { name: String, data: Vec<Vec<f32>>, ids: Vec<i64> },
    SetEf { name: String, new_ef: usize },
    GetEf { name: String },
    GetEfConstruction { name: String },
    QueryIndex { name: String, vectors: Vec<Vec<f32>>, k: usize },
    DeleteItem { name: String, label: i64 },
    ResizeIndex { name: String, new_size: usize },
    Count { name: String },
    MaxElements { name: String },
    Info { name: String },
    GetIndexes,
    GetItems { name: String, ids: Vec<i64> },
    GetIds { name: String },
}

/// Matches spec §6.3: clients inspect `state`; on `Failed` the payload
/// reconstructs the original exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandState {
    Created,
    Sent,
    Received,
    Executed,
    Failed,
    Succeeded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResultData {
    Unit,
    Bool(bool),
    Count(usize),
    Names(Vec<String>),
    Info(IndexInfo),
    Ids(Vec<i64>),
    Vectors(Vec<Vec<f32>>),
    Query { labels: Vec<Vec<i64>>, distances: Vec<Vec<f32>> },
    Token(Vec<u8>),
    Error(LuxError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub state: CommandState,
    pub data: ResultData,
}

impl CommandResult {
    pub fn succeeded(data: ResultData) -> Self {
        Self { state: CommandState::Succeeded, data: data }
    }

    pub fn failed(err: LuxError) -> Self {
        Self { state: CommandState::Failed, data: ResultData::Error(err) }
    }
}

/// Serializes `value` with postcard, then encrypts the bytes with `token`.
pub fn encode<T: Serialize>(value: &T, token: &Token) -> Result<Vec<u8>, TransportError> {
    let bytes = postcard::to_allocvec(value).map_err(|e| TransportError::EncodeFailure(e.to_string()))?;
    token.seal(&bytes)
}

/// Decrypts `payload` with `token`, then deserializes it with postcard.
pub fn decode<T: for<'de> Deserialize<'de>>(payload: &[u8], token: &Token) -> Result<T, TransportError> {
    let bytes = token.open(payload)?;
    postcard::from_bytes(&bytes).map_err(|e| TransportError::DecodeFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Token {
        let key = crate::crypto::derive_key("s3cr3t", b"salt", 10);
        Token::new(key, 60)
    }

    #[test]
    fn command_round_trips_through_codec() {
        let t = token();
        let cmd = Command::CreateIndex { name: "idx".into(), space: "l2".into(), dim: 8 };
        let wire = encode(&cmd, &t).unwrap();
        let back: Command = decode(&wire, &t).unwrap();
        match back {
            Command::CreateIndex { name, space, dim } => {
                assert_eq!(name, "idx");
                assert_eq!(space, "l2");
                assert_eq!(dim, 8);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn wrong_secret_fails_to_decode() {
        let t1 = token();
        let t2 = Token::new(crate::crypto::derive_key("other", b"salt", 10), 60);
        let cmd = Command::GetIndexes;
        let wire = encode(&cmd, &t1).unwrap();
        let err = decode::<Command>(&wire, &t2).unwrap_err();
        assert!(matches!(err, TransportError::InvalidToken));
    }

    #[test]
    fn result_round_trips() {
        let t = token();
        let result = CommandResult::succeeded(ResultData::Count(42));
        let wire = encode(&result, &t).unwrap();
        let back: CommandResult = decode(&wire, &t).unwrap();
        assert_eq!(back.state, CommandState::Succeeded);
        match back.data {
            ResultData::Count(n) => assert_eq!(n, 42),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn failed_result_carries_error() {
        let result = CommandResult::failed(LuxError::IndexDoesNotExist("idx".into()));
        assert_eq!(result.state, CommandState::Failed);
    }
}
