pub mod codec;
pub mod connection;
pub mod endpoint;
pub mod ws;
