//! Macro and Main craft.
//!
//! These two stages fix the segment's sequences, transposition, chords, key,
//! tempo, density, length and end time. Macro runs first; Main is scored
//! against the memes Macro contributed and transposed onto Macro's key.

use rand::RngCore;
use tracing::{info, warn};

use super::{admit_with_binding, choose_binding, choose_program, transpose_to, Scoring};
use crate::error::{ErrorCode, FabricationError, Result};
use crate::fabricator::timing::micros_for_beats;
use crate::fabricator::{ChoiceDraft, CraftContext, SegmentType, StageOutcome, StageReport, Workbench};
use crate::music::{transpose_chord, transpose_voicing, Key};
use crate::types::{Program, ProgramSequence, ProgramType, SequenceBinding};

/// A Macro or Main program placed in this segment.
#[derive(Debug, Clone, Copy)]
struct Placement<'p> {
    program: &'p Program,
    binding: &'p SequenceBinding,
    sequence: &'p ProgramSequence,
    transpose: i32,
}

impl<'p> Placement<'p> {
    fn key(&self) -> &'p str {
        self.sequence.key.as_deref().unwrap_or(&self.program.key)
    }

    fn tempo(&self) -> f64 {
        self.sequence.tempo.unwrap_or(self.program.tempo)
    }

    fn density(&self) -> f64 {
        self.sequence.density.unwrap_or(self.program.density)
    }
}

/// Crafts the Macro and Main choices and the segment outputs derived from them.
pub fn craft(ctx: &CraftContext<'_>, bench: &mut Workbench, rng: &mut dyn RngCore) -> Result<()> {
    let macro_ = craft_macro(ctx, bench, rng)?;
    let main = craft_main(ctx, bench, &macro_, rng)?;
    craft_chords(bench, &main);
    compute_outputs(ctx, bench, &macro_, &main);
    Ok(())
}

fn no_binding(program: &Program, offset: u32) -> FabricationError {
    FabricationError::new(
        ErrorCode::SelectionExhausted,
        format!("{} has no admissible sequence binding at offset {}", program, offset),
    )
}

fn sequence_of<'p>(program: &'p Program, binding: &SequenceBinding) -> Result<&'p ProgramSequence> {
    program
        .sequence_of(binding)
        .ok_or_else(|| FabricationError::not_found("ProgramSequence", &binding.sequence_id))
}

fn craft_macro<'p>(
    ctx: &CraftContext<'p>,
    bench: &mut Workbench,
    rng: &mut dyn RngCore,
) -> Result<Placement<'p>> {
    let taxonomy = ctx.taxonomy();
    let current = bench.memes().to_vec();

    let (program, binding, report) = match ctx.segment_type {
        SegmentType::Continue => {
            let previous = ctx.previous_macro()?;
            (
                previous.program,
                previous.binding,
                StageReport::new(ProgramType::Macro, StageOutcome::Continued),
            )
        }
        SegmentType::NextMain => {
            let previous = ctx.previous_macro()?;
            let offset = previous.next_offset();
            let binding = choose_binding(taxonomy, previous.program, offset, None, &current, rng)
                .ok_or_else(|| no_binding(previous.program, offset))?;
            (
                previous.program,
                binding,
                StageReport::new(ProgramType::Macro, StageOutcome::Continued),
            )
        }
        SegmentType::Initial | SegmentType::NextMacro => {
            let previous = match ctx.segment_type {
                SegmentType::NextMacro => Some(ctx.previous_macro()?),
                _ => None,
            };
            let previous_id = previous.map(|p| vec![p.program.id.clone()]).unwrap_or_default();
            let scoring = Scoring {
                weights: ctx.weights(ProgramType::Macro),
                previous_target: previous.map(|p| p.upcoming_memes()).unwrap_or_default(),
                accumulated_target: current.clone(),
                mode: previous
                    .and_then(|p| Key::parse(p.upcoming_key()).ok())
                    .map(|k| k.mode),
                repeats: previous_id.clone(),
                avoid: previous_id,
            };
            let (program, report) = choose_program(ctx, ProgramType::Macro, &scoring, &[], rng, |p| {
                admit_with_binding(taxonomy, p, 0, &current)
            })?;
            let avoid = previous.map(|p| p.binding.id.as_str());
            let binding = choose_binding(taxonomy, program, 0, avoid, &current, rng)
                .ok_or_else(|| no_binding(program, 0))?;
            (program, binding, report)
        }
    };

    let transpose = match ctx.segment_type {
        SegmentType::Initial => 0,
        SegmentType::Continue | SegmentType::NextMain => ctx.previous_macro()?.choice.transpose,
        SegmentType::NextMacro => {
            let previous = ctx.previous_macro()?;
            transpose_to(program, previous.upcoming_key(), previous.choice.transpose)
        }
    };
    let transpose = if program.config.do_transpose { transpose } else { 0 };

    let placement = Placement {
        program,
        binding,
        sequence: sequence_of(program, binding)?,
        transpose,
    };
    bench.add_choice(ChoiceDraft {
        program,
        sequence: Some(placement.sequence),
        binding: Some(binding),
        voice: None,
        transpose,
    });
    bench.record(report);
    info!(
        segment_id = %ctx.segment.id,
        program_id = %program.id,
        binding_id = %binding.id,
        offset = binding.offset,
        transpose,
        "Chose Macro"
    );
    Ok(placement)
}

fn craft_main<'p>(
    ctx: &CraftContext<'p>,
    bench: &mut Workbench,
    macro_: &Placement<'p>,
    rng: &mut dyn RngCore,
) -> Result<Placement<'p>> {
    let taxonomy = ctx.taxonomy();
    let current = bench.memes().to_vec();

    let (program, binding, report) = match ctx.segment_type {
        SegmentType::Continue => {
            let previous = ctx.previous_main()?;
            let offset = previous.next_offset();
            let binding = choose_binding(taxonomy, previous.program, offset, None, &current, rng)
                .ok_or_else(|| no_binding(previous.program, offset))?;
            (
                previous.program,
                binding,
                StageReport::new(ProgramType::Main, StageOutcome::Continued),
            )
        }
        SegmentType::Initial | SegmentType::NextMain | SegmentType::NextMacro => {
            let previous = if ctx.segment_type.has_predecessor() {
                Some(ctx.previous_main()?)
            } else {
                None
            };
            let scoring = Scoring {
                weights: ctx.weights(ProgramType::Main),
                previous_target: previous.map(|p| p.memes()).unwrap_or_default(),
                accumulated_target: current.clone(),
                mode: Key::parse(macro_.key()).ok().map(|k| k.mode),
                repeats: previous.map(|p| vec![p.program.id.clone()]).unwrap_or_default(),
                avoid: Vec::new(),
            };
            let (program, report) = choose_program(ctx, ProgramType::Main, &scoring, &[], rng, |p| {
                admit_with_binding(taxonomy, p, 0, &current)
            })?;
            let avoid = previous.map(|p| p.binding.id.as_str());
            let binding = choose_binding(taxonomy, program, 0, avoid, &current, rng)
                .ok_or_else(|| no_binding(program, 0))?;
            (program, binding, report)
        }
    };

    let transpose = transpose_to(program, macro_.key(), macro_.transpose);
    let placement = Placement {
        program,
        binding,
        sequence: sequence_of(program, binding)?,
        transpose,
    };
    bench.add_choice(ChoiceDraft {
        program,
        sequence: Some(placement.sequence),
        binding: Some(binding),
        voice: None,
        transpose,
    });
    bench.record(report);
    info!(
        segment_id = %ctx.segment.id,
        program_id = %program.id,
        binding_id = %binding.id,
        offset = binding.offset,
        transpose,
        "Chose Main"
    );
    Ok(placement)
}

/// Commits the Main sequence's chords that start within its length.
fn craft_chords(bench: &mut Workbench, main: &Placement<'_>) {
    let total = main.sequence.total as f64;
    for chord in main.sequence.chords.iter().filter(|c| c.position < total) {
        let name = match transpose_chord(&chord.name, main.transpose) {
            Ok(name) => name,
            Err(e) => {
                warn!(chord_id = %chord.id, error = %e, "Skipping chord");
                continue;
            }
        };
        let mut voicings = Vec::with_capacity(chord.voicings.len());
        for voicing in &chord.voicings {
            match transpose_voicing(&voicing.notes, main.transpose) {
                Ok(notes) => voicings.push((voicing.voice_id.clone(), notes)),
                Err(e) => warn!(voicing_id = %voicing.id, error = %e, "Skipping chord voicing"),
            }
        }
        bench.add_chord(name, chord.position, voicings);
    }
}

/// Key, tempo, density, length and end time of the segment.
fn compute_outputs(ctx: &CraftContext<'_>, bench: &mut Workbench, macro_: &Placement<'_>, main: &Placement<'_>) {
    match Key::parse(main.key()) {
        Ok(key) => bench.set_key(key.transpose(main.transpose)),
        Err(e) => warn!(segment_id = %ctx.segment.id, error = %e, "Segment has no key"),
    }

    let tempo = (macro_.tempo() + main.tempo()) / 2.0;
    let density = (macro_.density() + main.density()) / 2.0;
    let total = main.sequence.total;
    let previous_tempo = ctx.retrospective.previous_tempo().unwrap_or(tempo);

    let segment = bench.segment_mut();
    segment.tempo = Some(tempo);
    segment.density = Some(density);
    segment.total = Some(total);
    segment.end_at_micros =
        Some(segment.begin_at_micros + micros_for_beats(total as f64, previous_tempo, tempo));
}
