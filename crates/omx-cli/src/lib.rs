//! OMX CLI library.
//!
//! Command-line front end for the extractor: configuration file handling,
//! the PDF text source, provider selection and output formatting.

pub mod cli;
pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use config::Config;
pub use document::{extract_text, read_document, DocumentReadError};
pub use error::{CliError, Result};
pub use output::Formatter;
