//! Core types for the fabricator.
//!
//! This module re-exports all the entity types used throughout the engine:
//! - [`Chain`]: a continuously fabricated stream and its catalog bindings
//! - [`Segment`]: one fabricated unit plus its choices, memes and chords
//! - [`Program`]: catalog content chosen by the craft stages

mod chain;
mod program;
mod segment;

// Re-export all types at the module level
pub use chain::{Chain, ChainBinding, ChainBindingType, ChainState, ChainType};
pub use program::{
    ChordVoicing, Program, ProgramChord, ProgramConfig, ProgramPattern, ProgramSequence,
    ProgramType, ProgramVoice, SequenceBinding,
};
pub use segment::{
    compute_entity_id, Segment, SegmentChoice, SegmentChord, SegmentChordVoicing, SegmentMeme,
    SegmentState,
};
