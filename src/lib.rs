//! # Slidesmith
//!
//! Turns a topic into a slide deck using an LLM and a stock photo service.
//!
//! ## Pipeline
//!
//! - **Outline**: the model is prompted for a JSON outline, which is recovered
//!   from its reply even when wrapped in prose or markdown
//! - **Photos**: each slide's image keywords are searched in order and the
//!   first hit is attached
//! - **Document**: an outline, possibly edited by the user, is written out as
//!   a `.pptx` file

pub mod agent;
pub mod config;
pub mod deck;
pub mod extract;
pub mod images;
pub mod prompt;
pub mod server;
pub mod slide;

pub use config::Config;
pub use slide::{Outline, Slide};
