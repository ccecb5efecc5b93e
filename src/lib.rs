#![warn(clippy::all, rust_2018_idioms)]

pub mod agent;
mod app;
pub mod bridge;
pub mod charts;
pub mod clean;
pub mod config;
pub mod error;
pub mod ingest;
pub mod session;
pub mod summary;
pub mod table;
mod utils;
pub use app::App;
