#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod parser;

pub use config::{apply_overrides, load_settings};
pub use error::CliError;
pub use parser::Cli;
