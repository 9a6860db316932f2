//! Read-only view of the segments that came before the one being crafted.
//!
//! Only the same chain is visible. The immediately previous segment drives the
//! segment type and the continuity targets; earlier segments that share its
//! Main program are kept for constellation lookups.

use std::collections::BTreeMap;

use crate::error::{FabricationError, Result};
use crate::meme::constellation;
use crate::store::SegmentReader;
use crate::types::{ProgramType, Segment, SegmentChoice, SegmentChord, SegmentMeme};

/// A crafted segment with its committed records.
#[derive(Debug, Clone, Copy)]
pub struct PriorSegment<'a> {
    pub segment: &'a Segment,
    pub choices: &'a [SegmentChoice],
    pub memes: &'a [SegmentMeme],
    pub chords: &'a [SegmentChord],
}

impl<'a> PriorSegment<'a> {
    fn load<R: SegmentReader + ?Sized>(reader: &'a R, segment: &'a Segment) -> Self {
        Self {
            segment,
            choices: reader.choices(&segment.id),
            memes: reader.memes(&segment.id),
            chords: reader.chords(&segment.id),
        }
    }

    /// First choice of the type. Macro and Main have exactly one.
    pub fn choice_of_type(&self, program_type: ProgramType) -> Option<&'a SegmentChoice> {
        self.choices.iter().find(|c| c.program_type == program_type)
    }

    pub fn choices_of_type(&self, program_type: ProgramType) -> Vec<&'a SegmentChoice> {
        self.choices
            .iter()
            .filter(|c| c.program_type == program_type)
            .collect()
    }

    pub fn meme_names(&self) -> Vec<&'a str> {
        self.memes.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn constellation(&self) -> String {
        constellation(self.memes.iter().map(|m| m.name.as_str()))
    }
}

/// Prior segments of a chain relative to the segment being crafted.
#[derive(Debug, Clone, Default)]
pub struct Retrospective<'a> {
    previous: Option<PriorSegment<'a>>,
    /// The previous segment and the run of segments before it with the same
    /// Main program, newest first.
    same_main: Vec<PriorSegment<'a>>,
}

impl<'a> Retrospective<'a> {
    /// A retrospective with nothing before it (offset 0).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the prior segments of `segment`'s chain.
    ///
    /// Fails with CONTINUITY if the segment is not first in its chain and the
    /// previous segment is missing or has not been crafted.
    pub fn load<R: SegmentReader + ?Sized>(reader: &'a R, segment: &Segment) -> Result<Self> {
        if segment.offset == 0 {
            return Ok(Self::empty());
        }
        let previous_offset = segment.offset - 1;
        let previous = reader
            .segment_at(&segment.chain_id, previous_offset)
            .ok_or_else(|| {
                FabricationError::continuity(format!(
                    "Chain {} has no segment at offset {}",
                    segment.chain_id, previous_offset
                ))
            })?;
        if !previous.state.is_crafted() {
            return Err(FabricationError::continuity(format!(
                "Previous Segment[{}] is {}, not yet crafted",
                previous.id, previous.state
            )));
        }
        let previous = PriorSegment::load(reader, previous);

        let mut same_main = vec![previous];
        if let Some(main_program) = previous.choice_of_type(ProgramType::Main).map(|c| &c.program_id) {
            let mut offset = previous_offset;
            while offset > 0 {
                offset -= 1;
                let Some(earlier) = reader.segment_at(&segment.chain_id, offset) else {
                    break;
                };
                let earlier = PriorSegment::load(reader, earlier);
                match earlier.choice_of_type(ProgramType::Main) {
                    Some(c) if &c.program_id == main_program => same_main.push(earlier),
                    _ => break,
                }
            }
        }

        Ok(Self {
            previous: Some(previous),
            same_main,
        })
    }

    /// The immediately previous segment, None for the first segment of a chain.
    pub fn previous(&self) -> Option<&PriorSegment<'a>> {
        self.previous.as_ref()
    }

    pub fn previous_choice_of_type(&self, program_type: ProgramType) -> Option<&'a SegmentChoice> {
        self.previous.and_then(|p| p.choice_of_type(program_type))
    }

    pub fn previous_choices_of_type(&self, program_type: ProgramType) -> Vec<&'a SegmentChoice> {
        self.previous
            .map(|p| p.choices_of_type(program_type))
            .unwrap_or_default()
    }

    /// Memes committed for the previous segment.
    pub fn previous_memes(&self) -> Vec<&'a str> {
        self.previous.map(|p| p.meme_names()).unwrap_or_default()
    }

    pub fn previous_tempo(&self) -> Option<f64> {
        self.previous.and_then(|p| p.segment.tempo)
    }

    /// Prior segments sharing the previous segment's Main program, newest first.
    pub fn same_main(&self) -> &[PriorSegment<'a>] {
        &self.same_main
    }

    /// Choices of earlier segments sharing the previous Main program, grouped
    /// by a constellation computed for each segment. Newer segments come first.
    pub fn choices_by_constellation<F>(&self, constellation_of: F) -> BTreeMap<String, Vec<&'a SegmentChoice>>
    where
        F: Fn(&PriorSegment<'a>) -> String,
    {
        let mut out: BTreeMap<String, Vec<&'a SegmentChoice>> = BTreeMap::new();
        for prior in &self.same_main {
            out.entry(constellation_of(prior))
                .or_default()
                .extend(prior.choices.iter());
        }
        out
    }
}
