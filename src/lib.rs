//! popgate - decide whether an on-site promotional prompt should display.
//!
//! Per-reader view history, campaign suppression flags and permanent
//! dismissals are kept in a small keyed store; each request is answered from
//! that state, the prompt's display policy and site-wide settings.

pub mod app;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod server;
pub mod signals;
pub mod store;
pub mod test_utils;

pub use error::{PopgateError, Result};
