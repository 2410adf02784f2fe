// Books and chapters - what the player plays, loaded from a small manifest file

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("failed to read book manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML manifest: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("a book needs at least one chapter")]
    NoChapters,

    #[error("chapter {index} has invalid duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub description: String,
    /// Opaque handle, turned into a playable file by a `ResourceResolver`.
    #[serde(rename = "audio")]
    pub audio_ref: String,
    /// Seconds.
    pub duration: f64,
}

impl Chapter {
    pub fn new(description: impl Into<String>, audio_ref: impl Into<String>, duration: f64) -> Self {
        Self {
            description: description.into(),
            audio_ref: audio_ref.into(),
            duration,
        }
    }
}

/// A book always has at least one chapter; the constructor enforces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    id: BookId,
    image_ref: String,
    chapters: Vec<Chapter>,
}

/// On-disk shape of a book.
#[derive(Debug, Deserialize)]
struct BookManifest {
    #[serde(rename = "image")]
    image_ref: String,
    chapters: Vec<Chapter>,
}

impl Book {
    pub fn new(image_ref: impl Into<String>, chapters: Vec<Chapter>) -> Result<Self, BookError> {
        if chapters.is_empty() {
            return Err(BookError::NoChapters);
        }
        if let Some((index, chapter)) = chapters
            .iter()
            .enumerate()
            .find(|(_, c)| !c.duration.is_finite() || c.duration <= 0.0)
        {
            return Err(BookError::InvalidDuration {
                index,
                duration: chapter.duration,
            });
        }

        Ok(Self {
            id: BookId::new(),
            image_ref: image_ref.into(),
            chapters,
        })
    }

    /// Load a manifest; `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, BookError> {
        let content = fs::read_to_string(path)?;
        let manifest: BookManifest = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };

        let book = Self::new(manifest.image_ref, manifest.chapters)?;
        info!(
            "Loaded book {} with {} chapters from {}",
            book.id,
            book.chapters.len(),
            path.display()
        );
        Ok(book)
    }

    /// Three short chapters, handy for demos and `--simulate`.
    pub fn sample() -> Self {
        Self {
            id: BookId::new(),
            image_ref: "book".to_string(),
            chapters: vec![
                Chapter::new(
                    "Chapter 1: Design is not how a thing looks, but how it works",
                    "chapter_1",
                    330.0,
                ),
                Chapter::new(
                    "Chapter 2: Lorem ipsum dolor sit amet, consectetur adipiscing elit.",
                    "chapter_2",
                    280.0,
                ),
                Chapter::new(
                    "Chapter 3: Maecenas aliquam molestie mollis. Nunc a nunc augue.",
                    "chapter_3",
                    183.0,
                ),
            ],
        }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn total_duration(&self) -> f64 {
        self.chapters.iter().map(|c| c.duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_book_rejected() {
        assert!(matches!(Book::new("cover", vec![]), Err(BookError::NoChapters)));
    }

    #[test]
    fn test_bad_duration_rejected() {
        let chapters = vec![Chapter::new("a", "a", 10.0), Chapter::new("b", "b", 0.0)];
        match Book::new("cover", chapters) {
            Err(BookError::InvalidDuration { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_sample_book() {
        let book = Book::sample();
        assert_eq!(book.chapter_count(), 3);
        assert_eq!(book.total_duration(), 793.0);
        assert_eq!(book.chapter(2).map(|c| c.audio_ref.as_str()), Some("chapter_3"));
    }

    #[test]
    fn test_load_toml_manifest() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
image = "cover"

[[chapters]]
description = "Opening"
audio = "ch01"
duration = 61.5

[[chapters]]
description = "Closing"
audio = "ch02"
duration = 12
"#
        )
        .unwrap();

        let book = Book::load(file.path()).unwrap();
        assert_eq!(book.image_ref(), "cover");
        assert_eq!(book.chapters()[0].audio_ref, "ch01");
        assert_eq!(book.chapters()[1].duration, 12.0);
    }

    #[test]
    fn test_load_json_manifest() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"image": "cover", "chapters": [{{"description": "Only", "audio": "only", "duration": 5}}]}}"#
        )
        .unwrap();

        let book = Book::load(file.path()).unwrap();
        assert_eq!(book.chapter_count(), 1);
    }

    #[test]
    fn test_load_manifest_without_chapters() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "image = \"cover\"\nchapters = []").unwrap();
        assert!(matches!(Book::load(file.path()), Err(BookError::NoChapters)));
    }
}
