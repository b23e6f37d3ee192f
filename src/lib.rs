// Library surface for the terminal binary and headless integration tests.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod exclusion;
pub mod input;
pub mod logging;
pub mod preset;
pub mod runtime;
pub mod session;
pub mod snippet;
pub mod stats;
pub mod ui;

pub use error::{Error, Result};
