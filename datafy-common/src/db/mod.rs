//! Database initialization and schema

pub mod init;

pub use init::*;

use crate::{Error, Result};

/// Validate a table name before it is interpolated into SQL
///
/// Table names come from configuration and cannot be bound as parameters.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && name.len() <= 64 {
        Ok(())
    } else {
        Err(Error::Config(format!("Invalid table name: {:?}", name)))
    }
}
