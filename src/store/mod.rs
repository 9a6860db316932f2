//! Segment persistence: the retrospective provider and the persistence sink.
//!
//! Readers see only committed records. Writers enforce the segment lifecycle
//! Planned -> Crafting -> Dubbing -> Dubbed, with Crafting -> Planned on revert.

mod memory;

pub use memory::MemorySegmentStore;

use crate::error::Result;
use crate::types::{Segment, SegmentChoice, SegmentChord, SegmentMeme};

/// Read access to a chain's segments and their committed records.
pub trait SegmentReader {
    /// Looks up a segment by id.
    fn segment(&self, segment_id: &str) -> Result<&Segment>;

    /// The segment of `chain_id` at `offset`, if planned.
    fn segment_at(&self, chain_id: &str, offset: u64) -> Option<&Segment>;

    /// The segment of `chain_id` with the highest offset.
    fn last_segment(&self, chain_id: &str) -> Option<&Segment>;

    /// All segments of `chain_id`, ascending by offset.
    fn segments(&self, chain_id: &str) -> Vec<&Segment>;

    /// Committed choices of a segment; empty until crafted.
    fn choices(&self, segment_id: &str) -> &[SegmentChoice];

    /// Committed memes of a segment; empty until crafted.
    fn memes(&self, segment_id: &str) -> &[SegmentMeme];

    /// Committed chords of a segment; empty until crafted.
    fn chords(&self, segment_id: &str) -> &[SegmentChord];
}

/// Write access, enforcing state transitions.
pub trait SegmentWriter {
    /// Adds a Planned segment at the chain's next offset.
    fn plan(&mut self, segment: Segment) -> Result<()>;

    /// Guarded Planned -> Crafting transition.
    ///
    /// Fails with STATE_CONFLICT if the segment is not Planned or another
    /// segment of the same chain is Crafting.
    fn begin_crafting(&mut self, segment_id: &str) -> Result<Segment>;

    /// Stores the crafted segment with its records and moves it to Dubbing.
    fn commit(
        &mut self,
        segment: &Segment,
        choices: &[SegmentChoice],
        memes: &[SegmentMeme],
        chords: &[SegmentChord],
    ) -> Result<()>;

    /// Crafting -> Planned, discarding nothing but the state (nothing was persisted).
    fn revert(&mut self, segment_id: &str) -> Result<()>;

    /// Dubbing -> Dubbed, called by the downstream collaborator once audio is rendered.
    fn mark_dubbed(&mut self, segment_id: &str) -> Result<()>;
}
