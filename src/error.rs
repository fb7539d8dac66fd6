use thiserror::Error;

use crate::feed::codec::DecodeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("WebSocket error: {0}")]
    WebSocket(String),
}
