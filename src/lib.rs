//! Listicle Studio: generate a home-decor listicle with Gemini, illustrate it
//! with Ideogram, and push it to WordPress as a draft.
//!
//! The [`studio::Studio`] ties the pieces together; the `listicle` binary is
//! a thin command-line surface over it.

pub mod config;
pub mod draft;
pub mod generate;
pub mod http;
pub mod preview;
pub mod publish;
pub mod settings;
pub mod storage;
pub mod studio;
pub mod util;

pub use config::Config;
pub use draft::{ArticleDraft, DraftState, GeneratedImage, ImageRatio};
pub use settings::{Settings, WebsiteCredential};
pub use studio::{Status, StatusTone, Studio, StudioError};
