//! Utility functions shared by the generators, the publisher and the CLI.
//!
//! - **Text**: paragraph splitting, slug normalization, HTML escaping and
//!   terminal-safe truncation
//! - **URL validation**: HTTPS enforcement for every base URL that receives
//!   credentials
//!
//! # Examples
//!
//! ```
//! use listicle_studio::util::{format_slug, validate_base_url};
//!
//! let slug = format_slug("10 Warm Minimalist Living Rooms");
//! assert_eq!(slug, "10-warm-minimalist-living-rooms");
//!
//! let base = validate_base_url("https://decor.example.com").unwrap();
//! assert_eq!(base.scheme(), "https");
//! ```

mod text;
mod url_validator;

pub use text::{
    display_width, escape_html, format_paragraphs, format_slug, strip_control_chars,
    truncate_to_width,
};
pub use url_validator::{normalize_base_url, validate_base_url, UrlValidationError};
