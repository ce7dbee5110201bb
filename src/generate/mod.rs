//! Clients for the two generation services.
//!
//! - [`gemini`] - article text as a strict JSON object
//! - [`ideogram`] - one image per prompt, returned as a data URL
//!
//! Both clients validate their base URL on every call and never log keys.

pub mod gemini;
pub mod ideogram;

pub use gemini::{GeminiClient, GeminiError, GeminiOptions};
pub use ideogram::{IdeogramClient, IdeogramOptions, ImageError};
