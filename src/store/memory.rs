//! In-memory segment store.
//!
//! Holds every chain's segments keyed by id, with a per-chain offset index.

use std::collections::{BTreeMap, HashMap};

use super::{SegmentReader, SegmentWriter};
use crate::error::{FabricationError, Result};
use crate::types::{Segment, SegmentChoice, SegmentChord, SegmentMeme, SegmentState};

/// A stored segment and the records committed for it.
#[derive(Debug, Clone)]
struct SegmentEntry {
    segment: Segment,
    choices: Vec<SegmentChoice>,
    memes: Vec<SegmentMeme>,
    chords: Vec<SegmentChord>,
}

/// Segment store backed by hash maps.
#[derive(Debug, Clone, Default)]
pub struct MemorySegmentStore {
    /// Segments indexed by segment id.
    segments: HashMap<String, SegmentEntry>,
    /// chain id -> offset -> segment id
    offsets: HashMap<String, BTreeMap<u64, String>>,
}

impl MemorySegmentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of segments across all chains.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if the store holds no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn entry_mut(&mut self, segment_id: &str) -> Result<&mut SegmentEntry> {
        self.segments
            .get_mut(segment_id)
            .ok_or_else(|| FabricationError::not_found("Segment", segment_id))
    }

    fn expect_state(entry: &SegmentEntry, expected: SegmentState) -> Result<()> {
        if entry.segment.state != expected {
            return Err(FabricationError::state_conflict(format!(
                "Segment[{}] is {}, expected {}",
                entry.segment.id, entry.segment.state, expected
            )));
        }
        Ok(())
    }
}

impl SegmentReader for MemorySegmentStore {
    fn segment(&self, segment_id: &str) -> Result<&Segment> {
        self.segments
            .get(segment_id)
            .map(|entry| &entry.segment)
            .ok_or_else(|| FabricationError::not_found("Segment", segment_id))
    }

    fn segment_at(&self, chain_id: &str, offset: u64) -> Option<&Segment> {
        let id = self.offsets.get(chain_id)?.get(&offset)?;
        self.segments.get(id).map(|entry| &entry.segment)
    }

    fn last_segment(&self, chain_id: &str) -> Option<&Segment> {
        let (_, id) = self.offsets.get(chain_id)?.iter().next_back()?;
        self.segments.get(id).map(|entry| &entry.segment)
    }

    fn segments(&self, chain_id: &str) -> Vec<&Segment> {
        self.offsets
            .get(chain_id)
            .map(|index| {
                index
                    .values()
                    .filter_map(|id| self.segments.get(id).map(|entry| &entry.segment))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn choices(&self, segment_id: &str) -> &[SegmentChoice] {
        self.segments
            .get(segment_id)
            .map(|entry| entry.choices.as_slice())
            .unwrap_or(&[])
    }

    fn memes(&self, segment_id: &str) -> &[SegmentMeme] {
        self.segments
            .get(segment_id)
            .map(|entry| entry.memes.as_slice())
            .unwrap_or(&[])
    }

    fn chords(&self, segment_id: &str) -> &[SegmentChord] {
        self.segments
            .get(segment_id)
            .map(|entry| entry.chords.as_slice())
            .unwrap_or(&[])
    }
}

impl SegmentWriter for MemorySegmentStore {
    fn plan(&mut self, segment: Segment) -> Result<()> {
        if segment.state != SegmentState::Planned {
            return Err(FabricationError::state_conflict(format!(
                "Cannot plan Segment[{}] in state {}",
                segment.id, segment.state
            )));
        }
        let index = self.offsets.entry(segment.chain_id.clone()).or_default();
        let next_offset = index.keys().next_back().map(|o| o + 1).unwrap_or(0);
        if segment.offset != next_offset {
            return Err(FabricationError::state_conflict(format!(
                "Segment offset {} breaks chain sequence, expected {}",
                segment.offset, next_offset
            )));
        }
        if self.segments.contains_key(&segment.id) {
            return Err(FabricationError::state_conflict(format!(
                "Segment[{}] already exists",
                segment.id
            )));
        }
        index.insert(segment.offset, segment.id.clone());
        self.segments.insert(
            segment.id.clone(),
            SegmentEntry {
                segment,
                choices: Vec::new(),
                memes: Vec::new(),
                chords: Vec::new(),
            },
        );
        Ok(())
    }

    fn begin_crafting(&mut self, segment_id: &str) -> Result<Segment> {
        let chain_id = self.segment(segment_id)?.chain_id.clone();
        let busy = self
            .segments(&chain_id)
            .into_iter()
            .find(|s| s.state == SegmentState::Crafting)
            .map(|s| s.id.clone());
        if let Some(other) = busy {
            return Err(FabricationError::state_conflict(format!(
                "Segment[{}] of chain {} is already crafting",
                other, chain_id
            )));
        }
        let entry = self.entry_mut(segment_id)?;
        Self::expect_state(entry, SegmentState::Planned)?;
        entry.segment.state = SegmentState::Crafting;
        Ok(entry.segment.clone())
    }

    fn commit(
        &mut self,
        segment: &Segment,
        choices: &[SegmentChoice],
        memes: &[SegmentMeme],
        chords: &[SegmentChord],
    ) -> Result<()> {
        let entry = self.entry_mut(&segment.id)?;
        Self::expect_state(entry, SegmentState::Crafting)?;
        if entry.segment.offset != segment.offset || entry.segment.chain_id != segment.chain_id {
            return Err(FabricationError::state_conflict(format!(
                "Segment[{}] position changed during crafting",
                segment.id
            )));
        }
        entry.segment = Segment {
            state: SegmentState::Dubbing,
            ..segment.clone()
        };
        entry.choices = choices.to_vec();
        entry.memes = memes.to_vec();
        entry.chords = chords.to_vec();
        Ok(())
    }

    fn revert(&mut self, segment_id: &str) -> Result<()> {
        let entry = self.entry_mut(segment_id)?;
        Self::expect_state(entry, SegmentState::Crafting)?;
        entry.segment.reset_to_planned();
        entry.choices.clear();
        entry.memes.clear();
        entry.chords.clear();
        Ok(())
    }

    fn mark_dubbed(&mut self, segment_id: &str) -> Result<()> {
        let entry = self.entry_mut(segment_id)?;
        Self::expect_state(entry, SegmentState::Dubbing)?;
        entry.segment.state = SegmentState::Dubbed;
        Ok(())
    }
}
