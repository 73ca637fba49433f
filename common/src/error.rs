//! Shared error type

use thiserror::Error;

/// Error shared by the common crate
#[derive(Error, Debug)]
pub enum Error {
    /// Provider response without a usable JSON object
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_parse() {
        let error = Error::Parse("no JSON object in response".to_string());
        assert_eq!(format!("{}", error), "Parse error: no JSON object in response");
    }
}
