pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod input;
pub mod model;
pub mod sound;
pub mod storage;
pub mod ticker;
pub mod ui;
pub mod view;
