//! Blocking client (mirrors
//! `original_source/src/luxdb/sync_client.py::SyncClient`). No handshake
//! token comparison here because the original sync client doesn't
//! perform one either — it connects and sends commands directly.

use std::net::TcpStream;

use crate::codec::{self, Command, CommandState, ResultData};
use crate::crypto::{derive_key, Token};
use crate::error::TransportError;
use crate::frame::sync as frame;
use crate::index::IndexInfo;

pub use super::asynchronous::ClientError;

pub struct SyncClient {
    stream: TcpStream,
    token: Token,
}

impl SyncClient {
    pub fn connect(host: &str, port: u16, secret: &str, salt: &[u8], iterations: u32, ttl_secs: u64) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((host, port))?;
        let key = derive_key(secret, salt, iterations);
        Ok(Self { stream, token: Token::new(key, ttl_secs) })
    }

    fn send_command(&mut self, command: Command) -> Result<ResultData, ClientError> {
        let wire = codec::encode(&command, &self.token)?;
        frame::send_frame(&mut self.stream, &wire)?;

        let payload = frame::recv_frame(&mut self.stream)?
            .ok_or(ClientError::Transport(TransportError::Protocol("connection closed".into())))?;
        let result: crate::codec::CommandResult = codec::decode(&payload, &self.token)?;

        match result.state {
            CommandState::Succeeded => Ok(result.data),
            _ => match result.data {
                ResultData::Error(e) => Err(ClientError::Domain(e)),
                _ => Err(ClientError::UnexpectedResult),
            },
        }
    }

    pub fn index_exists(&mut self, name: &str) -> Result<bool, ClientError> {
        match self.send_command(Command::IndexExists { name: name.into() })? {
            ResultData::Bool(b) => Ok(b),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn create_index(&mut self, name: &str, space: &str, dim: usize) -> Result<bool, ClientError> {
        match self.send_command(Command::CreateIndex { name: name.into(), space: space.into(), dim })? {
            ResultData::Bool(b) => Ok(b),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn init_index(&mut self, name: &str, max_elements: usize, ef_construction: usize, m: usize) -> Result<(), ClientError> {
        self.send_command(Command::InitIndex { name: name.into(), max_elements, ef_construction, m })?;
        Ok(())
    }

    pub fn delete_index(&mut self, name: &str) -> Result<(), ClientError> {
        self.send_command(Command::DeleteIndex { name: name.into() })?;
        Ok(())
    }

    pub fn add_items(&mut self, name: &str, data: Vec<Vec<f32>>, ids: Vec<i64>) -> Result<(), ClientError> {
        self.send_command(Command::AddItems { name: name.into(), data, ids })?;
        Ok(())
    }

    pub fn set_ef(&mut self, name: &str, new_ef: usize) -> Result<(), ClientError> {
        self.send_command(Command::SetEf { name: name.into(), new_ef })?;
        Ok(())
    }

    pub fn get_ef(&mut self, name: &str) -> Result<usize, ClientError> {
        match self.send_command(Command::GetEf { name: name.into() })? {
            ResultData::Count(n) => Ok(n),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn get_ef_construction(&mut self, name: &str) -> Result<usize, ClientError> {
        match self.send_command(Command::GetEfConstruction { name: name.into() })? {
            ResultData::Count(n) => Ok(n),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn query_index(&mut self, name: &str, vectors: Vec<Vec<f32>>, k: usize) -> Result<(Vec<Vec<i64>>, Vec<Vec<f32>>), ClientError> {
        match self.send_command(Command::QueryIndex { name: name.into(), vectors, k })? {
            ResultData::Query { labels, distances } => Ok((labels, distances)),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn delete_item(&mut self, name: &str, label: i64) -> Result<(), ClientError> {
        self.send_command(Command::DeleteItem { name: name.into(), label })?;
        Ok(())
    }

    pub fn resize_index(&mut self, name: &str, new_size: usize) -> Result<(), ClientError> {
        self.send_command(Command::ResizeIndex { name: name.into(), new_size })?;
        Ok(())
    }

    pub fn count(&mut self, name: &str) -> Result<usize, ClientError> {
        match self.send_command(Command::Count { name: name.into() })? {
            ResultData::Count(n) => Ok(n),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn max_elements(&mut self, name: &str) -> Result<usize, ClientError> {
        match self.send_command(Command::MaxElements { name: name.into() })? {
            ResultData::Count(n) => Ok(n),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn info(&mut self, name: &str) -> Result<IndexInfo, ClientError> {
        match self.send_command(Command::Info { name: name.into() })? {
            ResultData::Info(info) => Ok(info),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn get_indexes(&mut self) -> Result<Vec<String>, ClientError> {
        match self.send_command(Command::GetIndexes)? {
            ResultData::Names(names) => Ok(names),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn get_items(&mut self, name: &str, ids: Vec<i64>) -> Result<Vec<Vec<f32>>, ClientError> {
        match self.send_command(Command::GetItems { name: name.into(), ids })? {
            ResultData::Vectors(v) => Ok(v),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn get_ids(&mut self, name: &str) -> Result<Vec<i64>, ClientError> {
        match self.send_command(Command::GetIds { name: name.into() })? {
            ResultData::Ids(ids) => Ok(ids),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub fn quit(&mut self) -> Result<(), ClientError> {
        frame::send_close(&mut self.stream)?;
        Ok(())
    }
}
