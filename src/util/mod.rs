//! Utility functions for common operations.
//!
//! - **URL validation**: absolute http(s) URLs for feed sources and article links

mod url_validator;

pub use url_validator::{validate_url, UrlValidationError};
