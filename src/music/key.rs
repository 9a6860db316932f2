//! Musical keys and the transposition arithmetic that chains segments together.
//!
//! A key is a root pitch class plus a mode. Comparisons for transposition use
//! the pitch class only; the mode is tracked separately for scoring.

use std::fmt;
use std::str::FromStr;

use super::pitch::{Accidental, PitchClass};
use crate::error::{FabricationError, Result};

/// Major or minor tonality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Major => "Major",
            Mode::Minor => "Minor",
        }
    }
}

/// A musical key, e.g. `C# Minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub root: PitchClass,
    pub mode: Mode,
    pub accidental: Accidental,
}

impl Key {
    /// Parses key text such as `C`, `Db Major`, `F# minor`, `Am`, `Bbmin` or `E-`.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let (root, accidental, consumed) = PitchClass::parse_prefix(trimmed)?;
        let rest = trimmed[consumed..].trim();
        let lower = rest.to_lowercase();
        let mode = if rest.is_empty() || rest == "M" || lower.starts_with("maj") {
            Mode::Major
        } else if rest.starts_with('m') || lower.starts_with("min") || rest.starts_with('-') {
            Mode::Minor
        } else {
            return Err(FabricationError::invalid_music(text, "unrecognized key mode"));
        };
        Ok(Self {
            root,
            mode,
            accidental,
        })
    }

    /// Returns this key shifted by a signed number of semitones, mode unchanged.
    pub fn transpose(self, semitones: i32) -> Self {
        Self {
            root: self.root.transpose(semitones),
            ..self
        }
    }

    /// Returns true if both keys share a mode.
    pub fn same_mode(&self, other: &Key) -> bool {
        self.mode == other.mode
    }
}

impl FromStr for Key {
    type Err = FabricationError;

    fn from_str(s: &str) -> Result<Self> {
        Key::parse(s)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.root.name(self.accidental), self.mode.as_str())
    }
}

/// Transposes `key` by `semitones`.
pub fn transpose(key: Key, semitones: i32) -> Key {
    key.transpose(semitones)
}

/// Signed semitone interval such that `from` transposed by the result lands on
/// `to` transposed by `accumulated`.
///
/// The result is normalised into `-5..=6`, so the smallest movement is always
/// preferred and deltas compose: `delta(b, c, delta(a, b, 0)) == delta(a, c, 0)`.
pub fn delta(from: &Key, to: &Key, accumulated: i32) -> i32 {
    let raw = (to.root.index() as i32 - from.root.index() as i32 + accumulated).rem_euclid(12);
    if raw > 6 {
        raw - 12
    } else {
        raw
    }
}

/// Like [`delta`] but parses both keys first.
pub fn delta_text(from: &str, to: &str, accumulated: i32) -> Result<i32> {
    Ok(delta(&Key::parse(from)?, &Key::parse(to)?, accumulated))
}
