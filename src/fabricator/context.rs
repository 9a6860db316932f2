//! Per-segment craft state.
//!
//! [`CraftContext`] is built once before any stage runs and never changes:
//! catalog, chain, retrospective, segment type and the resolved predecessor
//! choices. [`Workbench`] is the only mutable part, accumulating what the
//! stages decide until the segment is committed.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::segment_type::{determine_type, SegmentType};
use super::FabricatedSegment;
use crate::catalog::Catalog;
use crate::config::{FabricatorConfig, StageWeights};
use crate::error::{FabricationError, Result};
use crate::meme::{normalize, MemeTaxonomy};
use crate::music::Key;
use crate::retrospective::Retrospective;
use crate::types::{
    compute_entity_id, Chain, Program, ProgramSequence, ProgramType, ProgramVoice, Segment,
    SegmentChoice, SegmentChord, SegmentChordVoicing, SegmentMeme, SequenceBinding,
};

/// A Macro or Main choice of the previous segment, resolved against the catalog.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedChoice<'a> {
    pub choice: &'a SegmentChoice,
    pub program: &'a Program,
    pub binding: &'a SequenceBinding,
    pub sequence: &'a ProgramSequence,
}

impl<'a> ResolvedChoice<'a> {
    fn resolve(catalog: &'a dyn Catalog, choice: &'a SegmentChoice) -> Result<Self> {
        let unresolved = |reason: String| {
            FabricationError::continuity(format!(
                "Cannot resolve previous {} choice[{}]: {}",
                choice.program_type, choice.id, reason
            ))
        };
        let program = catalog
            .program(&choice.program_id)
            .map_err(|e| unresolved(e.message))?;
        let binding_id = choice
            .program_sequence_binding_id
            .as_deref()
            .ok_or_else(|| unresolved("no sequence binding".to_string()))?;
        let binding = program
            .binding(binding_id)
            .ok_or_else(|| unresolved(format!("binding[{}] not in {}", binding_id, program)))?;
        let sequence = program
            .sequence_of(binding)
            .ok_or_else(|| unresolved(format!("sequence[{}] not in {}", binding.sequence_id, program)))?;
        Ok(Self {
            choice,
            program,
            binding,
            sequence,
        })
    }

    /// Distinct binding offsets of the program after the one used.
    pub fn further_offsets(&self) -> usize {
        self.program.further_offsets(self.binding.offset)
    }

    pub fn next_offset(&self) -> u32 {
        self.program.next_offset(self.binding.offset)
    }

    /// Program memes plus the memes of the binding used.
    pub fn memes(&self) -> Vec<String> {
        let mut memes = self.program.memes.clone();
        memes.extend(self.binding.memes.iter().cloned());
        memes
    }

    /// Program memes plus the memes of every binding at the next offset.
    pub fn upcoming_memes(&self) -> Vec<String> {
        let mut memes = self.program.memes.clone();
        for binding in self.program.bindings_at(self.next_offset()) {
            memes.extend(binding.memes.iter().cloned());
        }
        memes
    }

    /// Key of the first sequence bound at the next offset, else the program key.
    pub fn upcoming_key(&self) -> &'a str {
        self.program
            .bindings_at(self.next_offset())
            .into_iter()
            .filter_map(|b| self.program.sequence_of(b))
            .find_map(|s| s.key.as_deref())
            .unwrap_or(&self.program.key)
    }

    /// Key of the bound sequence, else the program key.
    pub fn key(&self) -> &'a str {
        self.sequence.key.as_deref().unwrap_or(&self.program.key)
    }
}

/// Everything a craft stage reads, fixed for the whole segment.
pub struct CraftContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub chain: &'a Chain,
    pub segment: &'a Segment,
    pub config: &'a FabricatorConfig,
    pub retrospective: Retrospective<'a>,
    pub segment_type: SegmentType,
    previous_macro: Option<ResolvedChoice<'a>>,
    previous_main: Option<ResolvedChoice<'a>>,
}

impl<'a> CraftContext<'a> {
    /// Resolves the predecessor choices and derives the segment type.
    ///
    /// A previous choice that exists but cannot be resolved in the catalog is
    /// a CONTINUITY error.
    pub fn new(
        catalog: &'a dyn Catalog,
        chain: &'a Chain,
        segment: &'a Segment,
        config: &'a FabricatorConfig,
        retrospective: Retrospective<'a>,
    ) -> Result<Self> {
        let previous_macro = retrospective
            .previous_choice_of_type(ProgramType::Macro)
            .map(|c| ResolvedChoice::resolve(catalog, c))
            .transpose()?;
        let previous_main = retrospective
            .previous_choice_of_type(ProgramType::Main)
            .map(|c| ResolvedChoice::resolve(catalog, c))
            .transpose()?;
        let segment_type = determine_type(
            segment.offset,
            previous_main.map(|m| m.further_offsets()),
            previous_macro.map(|m| m.further_offsets()),
        );
        Ok(Self {
            catalog,
            chain,
            segment,
            config,
            retrospective,
            segment_type,
            previous_macro,
            previous_main,
        })
    }

    pub fn taxonomy(&self) -> &'a MemeTaxonomy {
        self.catalog.meme_taxonomy()
    }

    /// Scoring weights of a stage. Beat shares the Rhythm weights.
    pub fn weights(&self, program_type: ProgramType) -> StageWeights {
        match program_type {
            ProgramType::Macro => self.config.macro_weights,
            ProgramType::Main => self.config.main_weights,
            ProgramType::Rhythm | ProgramType::Beat => self.config.rhythm_weights,
            ProgramType::Detail => self.config.detail_weights,
        }
    }

    /// The previous Macro choice. Required for every type but Initial.
    pub fn previous_macro(&self) -> Result<ResolvedChoice<'a>> {
        self.previous_macro
            .ok_or_else(|| FabricationError::continuity(self.missing("Macro")))
    }

    /// The previous Main choice. Required for every type but Initial.
    pub fn previous_main(&self) -> Result<ResolvedChoice<'a>> {
        self.previous_main
            .ok_or_else(|| FabricationError::continuity(self.missing("Main")))
    }

    fn missing(&self, kind: &str) -> String {
        format!(
            "{} Segment[{}] has no previous {} choice",
            self.segment_type, self.segment.id, kind
        )
    }
}

/// How a stage arrived at its choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    /// Drawn from the scored candidate pool.
    Fresh,
    /// Carried over from the previous segment, offset advanced.
    Continued,
    /// Repeated from an earlier segment with the same meme constellation.
    Repeated,
    /// Nothing of this type bound to the chain.
    Skipped,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageOutcome::Fresh => "fresh",
            StageOutcome::Continued => "continued",
            StageOutcome::Repeated => "repeated",
            StageOutcome::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Diagnostic record of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub program_type: ProgramType,
    pub outcome: StageOutcome,
    /// Bag contents at draw time, empty unless drawn.
    pub bag: String,
    /// Candidates left out, with the reason.
    pub skipped: Vec<String>,
}

impl StageReport {
    pub fn new(program_type: ProgramType, outcome: StageOutcome) -> Self {
        Self {
            program_type,
            outcome,
            bag: String::new(),
            skipped: Vec::new(),
        }
    }
}

/// A choice about to be added to the workbench.
#[derive(Debug, Clone, Copy)]
pub struct ChoiceDraft<'p> {
    pub program: &'p Program,
    pub sequence: Option<&'p ProgramSequence>,
    pub binding: Option<&'p SequenceBinding>,
    pub voice: Option<&'p ProgramVoice>,
    pub transpose: i32,
}

/// Mutable accumulator for the segment being crafted.
#[derive(Debug, Clone)]
pub struct Workbench {
    segment: Segment,
    key: Option<Key>,
    choices: Vec<SegmentChoice>,
    /// Normalised, unique, in the order they were contributed.
    memes: Vec<String>,
    chords: Vec<SegmentChord>,
    reports: Vec<StageReport>,
}

impl Workbench {
    pub fn new(segment: &Segment) -> Self {
        Self {
            segment: segment.clone(),
            key: None,
            choices: Vec::new(),
            memes: Vec::new(),
            chords: Vec::new(),
            reports: Vec::new(),
        }
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn segment_mut(&mut self) -> &mut Segment {
        &mut self.segment
    }

    /// Segment key once Main craft has set it.
    pub fn key(&self) -> Option<Key> {
        self.key
    }

    pub fn set_key(&mut self, key: Key) {
        self.segment.key = Some(key.to_string());
        self.key = Some(key);
    }

    pub fn memes(&self) -> &[String] {
        &self.memes
    }

    pub fn add_memes<S: AsRef<str>>(&mut self, memes: &[S]) {
        for meme in memes {
            let name = normalize(meme.as_ref());
            if !name.is_empty() && !self.memes.contains(&name) {
                self.memes.push(name);
            }
        }
    }

    pub fn choices(&self) -> &[SegmentChoice] {
        &self.choices
    }

    /// Adds a choice and merges its program and binding memes.
    pub fn add_choice(&mut self, draft: ChoiceDraft<'_>) -> &SegmentChoice {
        let sequence_id = draft
            .sequence
            .map(|s| s.id.clone())
            .or_else(|| draft.binding.map(|b| b.sequence_id.clone()));
        let choice = SegmentChoice {
            id: compute_entity_id(&self.segment.id, "choice", self.choices.len() as u64),
            segment_id: self.segment.id.clone(),
            program_id: draft.program.id.clone(),
            program_type: draft.program.program_type,
            program_sequence_id: sequence_id,
            program_sequence_binding_id: draft.binding.map(|b| b.id.clone()),
            program_voice_id: draft.voice.map(|v| v.id.clone()),
            transpose: draft.transpose,
            sequence_binding_offset: draft.binding.map(|b| b.offset).unwrap_or(0),
        };
        self.add_memes(&draft.program.memes);
        if let Some(binding) = draft.binding {
            self.add_memes(&binding.memes);
        }
        self.choices.push(choice);
        &self.choices[self.choices.len() - 1]
    }

    /// Adds a transposed chord with its `(voice, notes)` voicings.
    pub fn add_chord(&mut self, name: String, position: f64, voicings: Vec<(Option<String>, String)>) {
        let id = compute_entity_id(&self.segment.id, "chord", self.chords.len() as u64);
        let voicings = voicings
            .into_iter()
            .enumerate()
            .map(|(i, (voice_id, notes))| SegmentChordVoicing {
                id: compute_entity_id(&id, "voicing", i as u64),
                voice_id,
                notes,
            })
            .collect();
        self.chords.push(SegmentChord {
            id,
            segment_id: self.segment.id.clone(),
            name,
            position,
            voicings,
        });
    }

    pub fn chords(&self) -> &[SegmentChord] {
        &self.chords
    }

    pub fn record(&mut self, report: StageReport) {
        self.reports.push(report);
    }

    /// Turns the accumulated decisions into committed records.
    pub fn finish(self, segment_type: SegmentType) -> FabricatedSegment {
        let segment_id = self.segment.id.clone();
        let memes = self
            .memes
            .into_iter()
            .enumerate()
            .map(|(i, name)| SegmentMeme {
                id: compute_entity_id(&segment_id, "meme", i as u64),
                segment_id: segment_id.clone(),
                name,
            })
            .collect();
        FabricatedSegment {
            segment: self.segment,
            segment_type,
            choices: self.choices,
            memes,
            chords: self.chords,
            reports: self.reports,
        }
    }
}
