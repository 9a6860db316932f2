//! Shared craft of the voice stages: Rhythm, Beat and Detail.
//!
//! A voice stage emits one choice per voice of each program it picks. On a
//! Continue segment it first tries to repeat what an earlier segment with the
//! same Macro/Main meme constellation chose, then to carry the previous
//! segment's programs forward, and only then draws fresh programs.

use rand::RngCore;
use tracing::{debug, info, warn};

use super::{admit_program, admit_with_binding, choose_binding, choose_program, transpose_to, Admission, Scoring};
use crate::catalog::Catalog;
use crate::error::{ErrorCode, Result};
use crate::fabricator::{ChoiceDraft, CraftContext, SegmentType, StageOutcome, StageReport, Workbench};
use crate::marble_bag::MarbleBag;
use crate::meme::{constellation, MemeStack, MemeTaxonomy};
use crate::types::{Program, ProgramSequence, ProgramType, ProgramVoice, SegmentChoice, SequenceBinding};

/// One program placed in the segment, with the voices it plays.
#[derive(Debug, Clone)]
struct Arrangement<'p> {
    program: &'p Program,
    sequence: Option<&'p ProgramSequence>,
    binding: Option<&'p SequenceBinding>,
    /// None stands for a program without voices.
    voices: Vec<Option<&'p ProgramVoice>>,
}

impl Arrangement<'_> {
    fn memes(&self) -> Vec<String> {
        let mut memes = self.program.memes.clone();
        if let Some(binding) = self.binding {
            memes.extend(binding.memes.iter().cloned());
        }
        memes
    }
}

/// Runs a voice stage choosing at most `limit` distinct programs.
///
/// A type with nothing bound to the chain is skipped. A type whose candidates
/// are all inadmissible fails with SELECTION_EXHAUSTED.
pub(super) fn craft_voice_stage(
    ctx: &CraftContext<'_>,
    bench: &mut Workbench,
    rng: &mut dyn RngCore,
    program_type: ProgramType,
    limit: usize,
) -> Result<()> {
    if !ctx.catalog.has_candidates(ctx.chain, program_type) {
        debug!(
            segment_id = %ctx.segment.id,
            program_type = %program_type,
            "No programs bound to chain, skipping stage"
        );
        bench.record(StageReport::new(program_type, StageOutcome::Skipped));
        return Ok(());
    }

    if ctx.segment_type == SegmentType::Continue {
        let taxonomy = ctx.taxonomy();
        let repeated = admissible(taxonomy, repeat_by_constellation(ctx, bench, program_type, limit), bench.memes());
        if !repeated.is_empty() {
            commit(ctx, bench, program_type, repeated, StageOutcome::Repeated);
            return Ok(());
        }
        let continued = admissible(taxonomy, continue_previous(ctx, bench, program_type, limit, rng), bench.memes());
        if !continued.is_empty() {
            commit(ctx, bench, program_type, continued, StageOutcome::Continued);
            return Ok(());
        }
    }

    craft_fresh(ctx, bench, rng, program_type, limit)
}

/// Constellation of the memes contributed by Macro and Main choices.
fn sequence_constellation<'c, I>(catalog: &dyn Catalog, choices: I) -> String
where
    I: IntoIterator<Item = &'c SegmentChoice>,
{
    let mut memes = Vec::new();
    for choice in choices.into_iter().filter(|c| c.program_type.is_sequence_stage()) {
        let Ok(program) = catalog.program(&choice.program_id) else {
            continue;
        };
        memes.extend(program.memes.iter().cloned());
        if let Some(binding) = choice
            .program_sequence_binding_id
            .as_deref()
            .and_then(|id| program.binding(id))
        {
            memes.extend(binding.memes.iter().cloned());
        }
    }
    constellation(memes)
}

/// Prior choices grouped by program, at most `limit` programs, one choice per voice.
fn group_by_program<'p>(
    catalog: &'p dyn Catalog,
    prior: Vec<&'p SegmentChoice>,
    limit: usize,
) -> Vec<(&'p Program, Vec<&'p SegmentChoice>)> {
    let mut groups: Vec<(&'p Program, Vec<&'p SegmentChoice>)> = Vec::new();
    for choice in prior {
        if let Some((_, choices)) = groups.iter_mut().find(|(p, _)| p.id == choice.program_id) {
            if !choices.iter().any(|c| c.program_voice_id == choice.program_voice_id) {
                choices.push(choice);
            }
            continue;
        }
        if groups.len() >= limit {
            continue;
        }
        match catalog.program(&choice.program_id) {
            Ok(program) => groups.push((program, vec![choice])),
            Err(e) => warn!(choice_id = %choice.id, error = %e, "Previous choice no longer in catalog"),
        }
    }
    groups
}

/// The looked-up entity, if it belongs to `program`.
fn owned_by<'p, T>(found: Result<(&'p Program, &'p T)>, program: &Program) -> Option<&'p T> {
    found
        .ok()
        .filter(|(owner, _)| owner.id == program.id)
        .map(|(_, item)| item)
}

fn voice_of<'p>(catalog: &'p dyn Catalog, program: &Program, choice: &SegmentChoice) -> Option<&'p ProgramVoice> {
    let id = choice.program_voice_id.as_deref()?;
    owned_by(catalog.voice(id), program)
}

fn sequence_of_choice<'p>(
    catalog: &'p dyn Catalog,
    program: &Program,
    choice: &SegmentChoice,
) -> Option<&'p ProgramSequence> {
    let id = choice.program_sequence_id.as_deref()?;
    owned_by(catalog.sequence(id), program)
}

/// Repeats the choices made by the newest earlier segment of the same Main
/// program whose Macro/Main constellation equals this segment's.
fn repeat_by_constellation<'p>(
    ctx: &CraftContext<'p>,
    bench: &Workbench,
    program_type: ProgramType,
    limit: usize,
) -> Vec<Arrangement<'p>> {
    let catalog = ctx.catalog;
    let current = sequence_constellation(catalog, bench.choices());
    let by_constellation = ctx
        .retrospective
        .choices_by_constellation(|prior| sequence_constellation(catalog, prior.choices));
    let prior: Vec<&'p SegmentChoice> = by_constellation
        .get(&current)
        .map(|choices| {
            choices
                .iter()
                .copied()
                .filter(|c| c.program_type == program_type)
                .collect()
        })
        .unwrap_or_default();

    group_by_program(catalog, prior, limit)
        .into_iter()
        .map(|(program, choices)| {
            let first = choices[0];
            let binding = first
                .program_sequence_binding_id
                .as_deref()
                .and_then(|id| owned_by(catalog.sequence_binding(id), program));
            Arrangement {
                program,
                sequence: sequence_of_choice(catalog, program, first),
                binding,
                voices: choices.iter().map(|c| voice_of(catalog, program, c)).collect(),
            }
        })
        .collect()
}

/// Carries the previous segment's programs forward, advancing bound programs
/// to their next offset (wrapping at the end).
fn continue_previous<'p>(
    ctx: &CraftContext<'p>,
    bench: &Workbench,
    program_type: ProgramType,
    limit: usize,
    rng: &mut dyn RngCore,
) -> Vec<Arrangement<'p>> {
    let taxonomy = ctx.taxonomy();
    let prior = ctx.retrospective.previous_choices_of_type(program_type);
    let mut arrangements = Vec::new();
    for (program, choices) in group_by_program(ctx.catalog, prior, limit) {
        let first = choices[0];
        let (sequence, binding) = if program.bindings.is_empty() {
            (sequence_of_choice(ctx.catalog, program, first), None)
        } else {
            let offset = program.next_offset(first.sequence_binding_offset);
            match choose_binding(taxonomy, program, offset, None, bench.memes(), rng) {
                Some(binding) => (program.sequence_of(binding), Some(binding)),
                None => continue,
            }
        };
        arrangements.push(Arrangement {
            program,
            sequence,
            binding,
            voices: choices.iter().map(|c| voice_of(ctx.catalog, program, c)).collect(),
        });
    }
    arrangements
}

/// Keeps the arrangements whose memes may join `current` and each other.
fn admissible<'p>(
    taxonomy: &MemeTaxonomy,
    arrangements: Vec<Arrangement<'p>>,
    current: &[String],
) -> Vec<Arrangement<'p>> {
    let mut stack = MemeStack::from(taxonomy, current);
    arrangements
        .into_iter()
        .filter(|a| {
            let memes = a.memes();
            if stack.is_allowed(&memes) {
                stack.extend(&memes);
                true
            } else {
                debug!(program_id = %a.program.id, "Previous arrangement no longer admissible");
                false
            }
        })
        .collect()
}

fn first_offset(program: &Program) -> Option<u32> {
    program.available_offsets().into_iter().next()
}

/// A program with bindings must have an admissible one at its first offset.
fn admit_voice_program(taxonomy: &MemeTaxonomy, program: &Program, current: &[String]) -> Result<Admission> {
    match first_offset(program) {
        Some(offset) => admit_with_binding(taxonomy, program, offset, current),
        None => Ok(admit_program(taxonomy, program, current)),
    }
}

fn fresh_arrangement<'p>(
    taxonomy: &MemeTaxonomy,
    program: &'p Program,
    current: &[String],
    rng: &mut dyn RngCore,
) -> Arrangement<'p> {
    let binding = first_offset(program)
        .and_then(|offset| choose_binding(taxonomy, program, offset, None, current, rng));
    let sequence = match binding {
        Some(binding) => program.sequence_of(binding),
        None => {
            let mut bag = MarbleBag::new();
            for sequence in &program.sequences {
                bag.add(1, sequence, 1.0);
            }
            bag.pick(rng).copied()
        }
    };
    let voices = if program.voices.is_empty() {
        vec![None]
    } else {
        program.voices.iter().map(Some).collect()
    };
    Arrangement {
        program,
        sequence,
        binding,
        voices,
    }
}

fn craft_fresh(
    ctx: &CraftContext<'_>,
    bench: &mut Workbench,
    rng: &mut dyn RngCore,
    program_type: ProgramType,
    limit: usize,
) -> Result<()> {
    let taxonomy = ctx.taxonomy();
    let mut repeats: Vec<String> = Vec::new();
    if ctx.segment_type.has_predecessor() {
        for choice in ctx.retrospective.previous_choices_of_type(program_type) {
            if !repeats.contains(&choice.program_id) {
                repeats.push(choice.program_id.clone());
            }
        }
    }
    let mode = bench.key().map(|k| k.mode);
    let previous_memes: Vec<String> = ctx
        .retrospective
        .previous_memes()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut chosen: Vec<String> = Vec::new();
    for round in 0..limit {
        let current = bench.memes().to_vec();
        let scoring = Scoring {
            weights: ctx.weights(program_type),
            previous_target: previous_memes.clone(),
            accumulated_target: current.clone(),
            mode,
            repeats: repeats.clone(),
            avoid: Vec::new(),
        };
        let drawn = choose_program(ctx, program_type, &scoring, &chosen, rng, |p| {
            admit_voice_program(taxonomy, p, &current)
        });
        let (program, report) = match drawn {
            Ok(drawn) => drawn,
            Err(e) if round > 0 && e.code == ErrorCode::SelectionExhausted => break,
            Err(e) => return Err(e),
        };
        let arrangement = fresh_arrangement(taxonomy, program, &current, rng);
        chosen.push(program.id.clone());
        add_arrangement(ctx, bench, program_type, &arrangement);
        bench.record(report);
    }
    Ok(())
}

fn commit(
    ctx: &CraftContext<'_>,
    bench: &mut Workbench,
    program_type: ProgramType,
    arrangements: Vec<Arrangement<'_>>,
    outcome: StageOutcome,
) {
    for arrangement in &arrangements {
        add_arrangement(ctx, bench, program_type, arrangement);
    }
    bench.record(StageReport::new(program_type, outcome));
}

/// Adds one choice per voice, transposed onto the segment key.
fn add_arrangement(ctx: &CraftContext<'_>, bench: &mut Workbench, program_type: ProgramType, arrangement: &Arrangement<'_>) {
    let transpose = bench
        .key()
        .map(|key| transpose_to(arrangement.program, &key.to_string(), 0))
        .unwrap_or(0);
    for voice in &arrangement.voices {
        bench.add_choice(ChoiceDraft {
            program: arrangement.program,
            sequence: arrangement.sequence,
            binding: arrangement.binding,
            voice: *voice,
            transpose,
        });
    }
    info!(
        segment_id = %ctx.segment.id,
        program_type = %program_type,
        program_id = %arrangement.program.id,
        voices = arrangement.voices.len(),
        transpose,
        "Chose {}",
        program_type
    );
}
