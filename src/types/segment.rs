//! Segment types: the fabricated unit and the decisions committed for it.
//!
//! Segments, choices, memes and chords are identified by deterministic ids
//! derived from their parent id, so identical inputs and seed produce
//! byte-identical fabrication output.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::program::ProgramType;

/// Lifecycle state of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentState {
    /// Created by the scheduler, nothing decided yet.
    #[default]
    Planned,
    /// A fabricator holds the segment.
    Crafting,
    /// Choices committed, waiting for audio to be dubbed downstream.
    Dubbing,
    /// Audio rendered.
    Dubbed,
}

impl SegmentState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentState::Planned => "planned",
            SegmentState::Crafting => "crafting",
            SegmentState::Dubbing => "dubbing",
            SegmentState::Dubbed => "dubbed",
        }
    }

    /// Returns true once choices, memes and chords have been committed.
    pub fn is_crafted(&self) -> bool {
        matches!(self, SegmentState::Dubbing | SegmentState::Dubbed)
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One fabricated unit of output plus its musical summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub chain_id: String,
    /// Position in the chain. Gapless and unique per chain, 0 first.
    pub offset: u64,
    pub state: SegmentState,
    pub begin_at_micros: u64,
    /// None until crafted.
    pub end_at_micros: Option<u64>,
    /// Rendered as `"<Root> <Major|Minor>"`.
    pub key: Option<String>,
    pub tempo: Option<f64>,
    pub density: Option<f64>,
    /// Length in beats.
    pub total: Option<u32>,
}

impl Segment {
    /// Creates a new Planned segment with a deterministic id.
    pub fn planned(chain_id: &str, offset: u64, begin_at_micros: u64) -> Self {
        Self {
            id: compute_entity_id(chain_id, "segment", offset),
            chain_id: chain_id.to_string(),
            offset,
            state: SegmentState::Planned,
            begin_at_micros,
            end_at_micros: None,
            key: None,
            tempo: None,
            density: None,
            total: None,
        }
    }

    /// Clears everything crafting computed, back to the planned state.
    pub fn reset_to_planned(&mut self) {
        self.state = SegmentState::Planned;
        self.end_at_micros = None;
        self.key = None;
        self.tempo = None;
        self.density = None;
        self.total = None;
    }
}

/// A program (and optionally sequence, binding and voice) chosen for a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentChoice {
    pub id: String,
    pub segment_id: String,
    pub program_id: String,
    pub program_type: ProgramType,
    pub program_sequence_id: Option<String>,
    pub program_sequence_binding_id: Option<String>,
    pub program_voice_id: Option<String>,
    /// Signed semitones applied to the program's native key.
    pub transpose: i32,
    pub sequence_binding_offset: u32,
}

/// A meme active in a segment. Names are normalised and unique per segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeme {
    pub id: String,
    pub segment_id: String,
    pub name: String,
}

/// A transposed chord voicing committed to a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentChordVoicing {
    pub id: String,
    pub voice_id: Option<String>,
    pub notes: String,
}

/// A transposed chord committed to a segment at a beat position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentChord {
    pub id: String,
    pub segment_id: String,
    pub name: String,
    pub position: f64,
    pub voicings: Vec<SegmentChordVoicing>,
}

/// Computes a deterministic entity ID.
///
/// The ID is the first 16 hex characters of the SHA256 hash of
/// `{parent_id}:{kind}:{ordinal}`.
pub fn compute_entity_id(parent_id: &str, kind: &str, ordinal: u64) -> String {
    let input = format!("{}:{}:{}", parent_id, kind, ordinal);
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    // Take first 8 bytes (16 hex chars)
    hex::encode(&result[..8])
}
