//! Catalog content: programs and everything they own.
//!
//! A Program is a reusable composition unit of one type. It owns sequences
//! (passages with optional key/tempo/density overrides), sequence bindings
//! (placements of a sequence at an integer offset in the program's timeline),
//! voices, patterns and chords.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Bound;

use crate::error::Result;
use crate::music::Key;

/// Program type, which decides the craft stage that may choose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProgramType {
    Macro,
    Main,
    Rhythm,
    Beat,
    Detail,
}

impl ProgramType {
    /// Returns the string representation of the program type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramType::Macro => "Macro",
            ProgramType::Main => "Main",
            ProgramType::Rhythm => "Rhythm",
            ProgramType::Beat => "Beat",
            ProgramType::Detail => "Detail",
        }
    }

    /// Parses a program type from a string, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "macro" => Some(ProgramType::Macro),
            "main" => Some(ProgramType::Main),
            "rhythm" => Some(ProgramType::Rhythm),
            "beat" => Some(ProgramType::Beat),
            "detail" => Some(ProgramType::Detail),
            _ => None,
        }
    }

    /// Macro and Main programs drive the segment's key, tempo and length.
    pub fn is_sequence_stage(&self) -> bool {
        matches!(self, ProgramType::Macro | ProgramType::Main)
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Per-program fabrication options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// When false, every choice of this program has transpose 0.
    #[serde(default = "default_true")]
    pub do_transpose: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self { do_transpose: true }
    }
}

/// Placement of a sequence at an integer offset within a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceBinding {
    pub id: String,
    pub sequence_id: String,
    pub offset: u32,
    #[serde(default)]
    pub memes: Vec<String>,
}

/// Voicing of a chord for one voice, as a note list like `"C4, E4, G4"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordVoicing {
    pub id: String,
    #[serde(default)]
    pub voice_id: Option<String>,
    pub notes: String,
}

/// A chord placed at a beat position within a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramChord {
    pub id: String,
    pub name: String,
    pub position: f64,
    #[serde(default)]
    pub voicings: Vec<ChordVoicing>,
}

/// A pattern for one voice. Consumed by arrangement downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramPattern {
    pub id: String,
    pub voice_id: String,
    pub name: String,
    pub total: u32,
}

/// A musical passage within a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSequence {
    pub id: String,
    pub name: String,
    /// Overrides the program key when set.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub density: Option<f64>,
    /// Length in beats.
    pub total: u32,
    #[serde(default)]
    pub patterns: Vec<ProgramPattern>,
    #[serde(default)]
    pub chords: Vec<ProgramChord>,
}

/// A voice of a program (one instrument part).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramVoice {
    pub id: String,
    pub name: String,
}

/// A reusable composition unit of a specific type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub library_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub program_type: ProgramType,
    pub key: String,
    pub tempo: f64,
    pub density: f64,
    #[serde(default)]
    pub memes: Vec<String>,
    #[serde(default)]
    pub config: ProgramConfig,
    #[serde(default)]
    pub sequences: Vec<ProgramSequence>,
    #[serde(default)]
    pub bindings: Vec<SequenceBinding>,
    #[serde(default)]
    pub voices: Vec<ProgramVoice>,
}

impl Program {
    pub fn parsed_key(&self) -> Result<Key> {
        Key::parse(&self.key)
    }

    pub fn sequence(&self, sequence_id: &str) -> Option<&ProgramSequence> {
        self.sequences.iter().find(|s| s.id == sequence_id)
    }

    pub fn binding(&self, binding_id: &str) -> Option<&SequenceBinding> {
        self.bindings.iter().find(|b| b.id == binding_id)
    }

    /// Bindings placed at `offset`, in catalog order.
    pub fn bindings_at(&self, offset: u32) -> Vec<&SequenceBinding> {
        self.bindings.iter().filter(|b| b.offset == offset).collect()
    }

    /// Distinct binding offsets, ascending.
    pub fn available_offsets(&self) -> BTreeSet<u32> {
        self.bindings.iter().map(|b| b.offset).collect()
    }

    /// Number of distinct binding offsets strictly after `offset`.
    pub fn further_offsets(&self, offset: u32) -> usize {
        self.available_offsets()
            .range((Bound::Excluded(offset), Bound::Unbounded))
            .count()
    }

    /// Smallest available offset after `offset`, wrapping to the first one.
    /// Returns 0 when the program has no bindings.
    pub fn next_offset(&self, offset: u32) -> u32 {
        let offsets = self.available_offsets();
        offsets
            .range((Bound::Excluded(offset), Bound::Unbounded))
            .next()
            .or_else(|| offsets.iter().next())
            .copied()
            .unwrap_or(0)
    }

    /// The sequence placed by a binding of this program.
    pub fn sequence_of(&self, binding: &SequenceBinding) -> Option<&ProgramSequence> {
        self.sequence(&binding.sequence_id)
    }

    /// Validates internal references.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.id.is_empty() {
            return Some("Program ID cannot be empty".to_string());
        }
        if !self.tempo.is_finite() || self.tempo <= 0.0 {
            return Some(format!("Program[{}] tempo must be > 0, got {}", self.id, self.tempo));
        }
        for binding in &self.bindings {
            if self.sequence(&binding.sequence_id).is_none() {
                return Some(format!(
                    "Program[{}] binding[{}] references unknown sequence[{}]",
                    self.id, binding.id, binding.sequence_id
                ));
            }
        }
        for sequence in &self.sequences {
            for pattern in &sequence.patterns {
                if !self.voices.iter().any(|v| v.id == pattern.voice_id) {
                    return Some(format!(
                        "Program[{}] pattern[{}] references unknown voice[{}]",
                        self.id, pattern.id, pattern.voice_id
                    ));
                }
            }
        }
        None
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_with_offsets(offsets: &[u32]) -> Program {
        Program {
            id: "p1".to_string(),
            library_id: "lib".to_string(),
            name: "Test".to_string(),
            program_type: ProgramType::Main,
            key: "C".to_string(),
            tempo: 120.0,
            density: 0.5,
            memes: vec![],
            config: ProgramConfig::default(),
            sequences: vec![ProgramSequence {
                id: "s1".to_string(),
                name: "A".to_string(),
                key: None,
                tempo: None,
                density: None,
                total: 16,
                patterns: vec![],
                chords: vec![],
            }],
            bindings: offsets
                .iter()
                .enumerate()
                .map(|(i, o)| SequenceBinding {
                    id: format!("b{}", i),
                    sequence_id: "s1".to_string(),
                    offset: *o,
                    memes: vec![],
                })
                .collect(),
            voices: vec![],
        }
    }

    #[test]
    fn program_type_parsing() {
        assert_eq!(ProgramType::parse("MACRO"), Some(ProgramType::Macro));
        assert_eq!(ProgramType::parse("beat"), Some(ProgramType::Beat));
        assert_eq!(ProgramType::parse("pad"), None);
        assert_eq!(ProgramType::Detail.to_string(), "Detail");
        assert!(ProgramType::Main.is_sequence_stage());
        assert!(!ProgramType::Rhythm.is_sequence_stage());
    }

    #[test]
    fn further_offsets_counts_distinct() {
        let p = program_with_offsets(&[0, 0, 1, 2]);
        assert_eq!(p.further_offsets(0), 2);
        assert_eq!(p.further_offsets(1), 1);
        assert_eq!(p.further_offsets(2), 0);
        assert_eq!(p.bindings_at(0).len(), 2);
    }

    #[test]
    fn next_offset_wraps() {
        let p = program_with_offsets(&[0, 2, 5]);
        assert_eq!(p.next_offset(0), 2);
        assert_eq!(p.next_offset(2), 5);
        assert_eq!(p.next_offset(5), 0);
        assert_eq!(program_with_offsets(&[]).next_offset(3), 0);
    }

    #[test]
    fn config_defaults_to_transpose() {
        let config: ProgramConfig = serde_json::from_str("{}").unwrap();
        assert!(config.do_transpose);
    }

    #[test]
    fn validate_catches_dangling_sequence() {
        let mut p = program_with_offsets(&[0]);
        assert!(p.validate().is_none());
        p.bindings[0].sequence_id = "missing".to_string();
        assert!(p.validate().unwrap().contains("unknown sequence"));
    }

    #[test]
    fn deserializes_with_type_field() {
        let json = r#"{"id":"m","library_id":"l","name":"M","type":"Macro","key":"D minor","tempo":90,"density":0.4}"#;
        let p: Program = serde_json::from_str(json).unwrap();
        assert_eq!(p.program_type, ProgramType::Macro);
        assert!(p.bindings.is_empty());
        assert!(p.config.do_transpose);
    }
}
