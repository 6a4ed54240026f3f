//! Slide records - the structured unit passed between every stage.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single slide of an outline.
///
/// Produced by the JSON extractor from model output, fitted with an
/// `image_url` by the image enricher, and read by the deck writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub id: i64,
    pub title: String,
    /// Bullet points, in display order
    #[serde(default)]
    pub points: Vec<String>,
    /// Search keywords for the slide photo, tried in order
    #[serde(default)]
    pub image_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// An ordered list of slides.
pub type Outline = Vec<Slide>;

#[cfg(test)]
impl Slide {
    pub(crate) fn new(id: i64, title: impl Into<String>, points: Vec<String>) -> Self {
        Self {
            id,
            title: title.into(),
            points,
            image_keywords: Vec::new(),
            image_url: None,
        }
    }

    pub(crate) fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.image_keywords = keywords;
        self
    }

    pub(crate) fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

/// Return the first id that appears more than once, if any.
pub fn duplicate_id(slides: &[Slide]) -> Option<i64> {
    let mut seen = HashSet::new();
    slides.iter().map(|s| s.id).find(|id| !seen.insert(*id))
}
