#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod comments;
pub mod config;
pub mod data;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod model;
pub mod playback;
pub mod player;
pub mod session;
pub mod storage;
pub mod ui;
pub mod upload;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
