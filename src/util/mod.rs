//! Utility functions shared by discovery and storage.
//!
//! - **URL handling**: [`SiteUrl`] for structured access to a page URL and
//!   [`validate_url`] for rejecting unsupported or internal targets
//! - **Text processing**: sanitizing feed-supplied titles before storage

mod site_url;
mod text;
mod url_validator;

pub use site_url::SiteUrl;
pub use text::{collapse_whitespace, sanitize_title, strip_control_chars};
pub use url_validator::{validate_url, UrlValidationError};
