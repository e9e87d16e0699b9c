#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod frpc;
pub mod runner;

#[cfg(test)]
mod test_support;

pub use app::App;
pub use error::{Error, Result};
