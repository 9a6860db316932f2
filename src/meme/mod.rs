//! Meme handling: normalisation, taxonomy, admissibility stack and isometry.
//!
//! Memes are short descriptive tags (e.g. `WINTER`, `DARK`). Two prefixes
//! change their meaning:
//! - `!X` is an anti-meme: it may never coexist with `X`.
//! - `$X` is a unique meme: it is refused when `X` is already present.

pub mod isometry;
pub mod stack;
pub mod taxonomy;

pub use isometry::{constellation, score, MemeIsometry};
pub use stack::{is_allowed, MemeStack};
pub use taxonomy::{MemeCategory, MemeTaxonomy};

/// How a meme participates in admissibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemeKind {
    Plain,
    Anti,
    Unique,
}

/// A normalised meme split into its marker and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMeme {
    pub kind: MemeKind,
    /// Upper-case name without marker.
    pub body: String,
}

impl ParsedMeme {
    pub fn parse(raw: &str) -> Self {
        let name = normalize(raw);
        if let Some(body) = name.strip_prefix('!') {
            Self {
                kind: MemeKind::Anti,
                body: body.to_string(),
            }
        } else if let Some(body) = name.strip_prefix('$') {
            Self {
                kind: MemeKind::Unique,
                body: body.to_string(),
            }
        } else {
            Self {
                kind: MemeKind::Plain,
                body: name,
            }
        }
    }
}

/// Normalises a meme name: trimmed and upper-cased, marker kept.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}
