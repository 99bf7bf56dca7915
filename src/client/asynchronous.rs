//! Async client (mirrors `original_source/src/luxdb/client.py::Client`).

use subtle::ConstantTimeEq;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::codec::{self, Command, CommandState, ResultData};
use crate::crypto::{derive_key, Token};
use crate::dispatch::random_token;
use crate::error::{LuxError, TransportError};
use crate::index::IndexInfo;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Domain(#[from] LuxError),
    #[error("connection failed, make sure your secret is correct")]
    HandshakeFailed,
    #[error("server returned an unexpected result variant")]
    UnexpectedResult,
}

pub struct Client {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    token: Token,
}

impl Client {
    /// Connects to `host:port` and performs the Connect handshake. Fails
    /// with `HandshakeFailed` if the server doesn't echo the random
    /// payload back — wrong secret, wrong server, or tampered transport.
    pub async fn connect(
        host: &str,
        port: u16,
        secret: &str,
        salt: &[u8],
        iterations: u32,
        ttl_secs: u64,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((host, port)).await?;
        let (reader, writer) = stream.into_split();
        let key = derive_key(secret, salt, iterations);
        let token = Token::new(key, ttl_secs);

        let mut client = Self { reader, writer, token };

        let payload = random_token();
        let result = client.send_command(Command::Connect { payload: payload.clone() }).await?;
        let ResultData::Token(echoed) = result else {
            return Err(ClientError::UnexpectedResult);
        };

        if echoed.as_slice().ct_eq(payload.as_slice()).unwrap_u8() != 1 {
            return Err(ClientError::HandshakeFailed);
        }

        Ok(client)
    }

    async fn send_command(&mut self, command: Command) -> Result<ResultData, ClientError> {
        let wire = codec::encode(&command, &self.token)?;
        crate::frame::send_frame(&mut self.writer, &wire).await?;

        let payload = crate::frame::recv_frame(&mut self.reader)
            .await?
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

    pub async fn index_exists(&mut self, name: &str) -> Result<bool, ClientError> {
        match self.send_command(Command::IndexExists { name: name.into() }).await? {
            ResultData::Bool(b) => Ok(b),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn create_index(&mut self, name: &str, space: &str, dim: usize) -> Result<bool, ClientError> {
        match self
            .send_command(Command::CreateIndex { name: name.into(), space: space.into(), dim })
            .await?
        {
            ResultData::Bool(b) => Ok(b),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn init_index(&mut self, name: &str, max_elements: usize, ef_construction: usize, m: usize) -> Result<(), ClientError> {
        self.send_command(Command::InitIndex { name: name.into(), max_elements, ef_construction, m }).await?;
        Ok(())
    }

    pub async fn delete_index(&mut self, name: &str) -> Result<(), ClientError> {
        self.send_command(Command::DeleteIndex { name: name.into() }).await?;
        Ok(())
    }

    pub async fn add_items(&mut self, name: &str, data: Vec<Vec<f32>>, ids: Vec<i64>) -> Result<(), ClientError> {
        self.send_command(Command::AddItems { name: name.into(), data, ids }).await?;
        Ok(())
    }

    pub async fn set_ef(&mut self, name: &str, new_ef: usize) -> Result<(), ClientError> {
        self.send_command(Command::SetEf { name: name.into(), new_ef }).await?;
        Ok(())
    }

    pub async fn get_ef(&mut self, name: &str) -> Result<usize, ClientError> {
        match self.send_command(Command::GetEf { name: name.into() }).await? {
            ResultData::Count(n) => Ok(n),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn get_ef_construction(&mut self, name: &str) -> Result<usize, ClientError> {
        match self.send_command(Command::GetEfConstruction { name: name.into() }).await? {
            ResultData::Count(n) => Ok(n),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn query_index(&mut self, name: &str, vectors: Vec<Vec<f32>>, k: usize) -> Result<(Vec<Vec<i64>>, Vec<Vec<f32>>), ClientError> {
        match self.send_command(Command::QueryIndex { name: name.into(), vectors, k }).await? {
            ResultData::Query { labels, distances } => Ok((labels, distances)),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn delete_item(&mut self, name: &str, label: i64) -> Result<(), ClientError> {
        self.send_command(Command::DeleteItem { name: name.into(), label }).await?;
        Ok(())
    }

    pub async fn resize_index(&mut self, name: &str, new_size: usize) -> Result<(), ClientError> {
        self.send_command(Command::ResizeIndex { name: name.into(), new_size }).await?;
        Ok(())
    }

    pub async fn count(&mut self, name: &str) -> Result<usize, ClientError> {
        match self.send_command(Command::Count { name: name.into() }).await? {
            ResultData::Count(n) => Ok(n),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn max_elements(&mut self, name: &str) -> Result<usize, ClientError> {
        match self.send_command(Command::MaxElements { name: name.into() }).await? {
            ResultData::Count(n) => Ok(n),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn info(&mut self, name: &str) -> Result<IndexInfo, ClientError> {
        match self.send_command(Command::Info { name: name.into() }).await? {
            ResultData::Info(info) => Ok(info),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn get_indexes(&mut self) -> Result<Vec<String>, ClientError> {
        match self.send_command(Command::GetIndexes).await? {
            ResultData::Names(names) => Ok(names),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn get_items(&mut self, name: &str, ids: Vec<i64>) -> Result<Vec<Vec<f32>>, ClientError> {
        match self.send_command(Command::GetItems { name: name.into(), ids }).await? {
            ResultData::Vectors(v) => Ok(v),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn get_ids(&mut self, name: &str) -> Result<Vec<i64>, ClientError> {
        match self.send_command(Command::GetIds { name: name.into() }).await? {
            ResultData::Ids(ids) => Ok(ids),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    /// Sends the close sentinel and lets the connection drop.
    pub async fn quit(&mut self) -> Result<(), ClientError> {
        crate::frame::send_close(&mut self.writer).await?;
        Ok(())
    }
}
