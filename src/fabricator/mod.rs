//! Fabricator: crafts one segment of a chain.
//!
//! Loads the retrospective, derives the segment type, then runs the craft
//! stages strictly in order (Macro/Main, Rhythm, Beat, Detail), each one seeing
//! the memes committed by the stages before it. Nothing is persisted here; the
//! caller commits the returned [`FabricatedSegment`] or reverts the segment.

pub mod context;
pub mod seed;
pub mod segment_type;
pub mod timing;

pub use context::{ChoiceDraft, CraftContext, ResolvedChoice, StageOutcome, StageReport, Workbench};
pub use seed::{segment_rng, segment_seed};
pub use segment_type::{determine_type, SegmentType};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::config::FabricatorConfig;
use crate::craft::{detail, macro_main, rhythm};
use crate::error::{FabricationError, Result};
use crate::retrospective::Retrospective;
use crate::store::SegmentReader;
use crate::types::{Chain, Segment, SegmentChoice, SegmentChord, SegmentMeme};

/// Everything decided for one segment, ready to commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricatedSegment {
    /// The segment with key, tempo, density, total and end time filled in.
    pub segment: Segment,
    pub segment_type: SegmentType,
    pub choices: Vec<SegmentChoice>,
    pub memes: Vec<SegmentMeme>,
    pub chords: Vec<SegmentChord>,
    pub reports: Vec<StageReport>,
}

/// Crafts `segment` of `chain`.
///
/// The segment's predecessor must already be committed in `reader`. All
/// random draws come from `rng`, so a seeded generator reproduces the result.
pub fn fabricate(
    catalog: &dyn Catalog,
    reader: &dyn SegmentReader,
    chain: &Chain,
    segment: &Segment,
    config: &FabricatorConfig,
    rng: &mut dyn RngCore,
) -> Result<FabricatedSegment> {
    if segment.chain_id != chain.id {
        return Err(FabricationError::state_conflict(format!(
            "Segment[{}] belongs to chain {}, not {}",
            segment.id, segment.chain_id, chain.id
        )));
    }

    let retrospective = Retrospective::load(reader, segment)?;
    let ctx = CraftContext::new(catalog, chain, segment, config, retrospective)?;
    info!(
        segment_id = %segment.id,
        chain_id = %chain.id,
        offset = segment.offset,
        segment_type = %ctx.segment_type,
        "Fabricating segment"
    );

    let mut bench = Workbench::new(segment);
    macro_main::craft(&ctx, &mut bench, rng)?;
    rhythm::craft_rhythm(&ctx, &mut bench, rng)?;
    rhythm::craft_beat(&ctx, &mut bench, rng)?;
    detail::craft_detail(&ctx, &mut bench, rng)?;

    let fabricated = bench.finish(ctx.segment_type);
    info!(
        segment_id = %segment.id,
        choices = fabricated.choices.len(),
        memes = fabricated.memes.len(),
        chords = fabricated.chords.len(),
        key = fabricated.segment.key.as_deref().unwrap_or("-"),
        "Fabricated segment"
    );
    Ok(fabricated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ContentStore;
    use crate::error::ErrorCode;
    use crate::store::{MemorySegmentStore, SegmentWriter};
    use crate::testing::{
        catalog, choices_of, fabricate_chain, library_chain, program, program_with_bindings, with_voices,
    };
    use crate::types::ProgramType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn run_chain(store: &ContentStore, count: u64, seed: u64) -> Vec<FabricatedSegment> {
        fabricate_chain(store, &FabricatorConfig::default(), count, seed)
    }

    fn choice_of(done: &FabricatedSegment, program_type: ProgramType) -> &SegmentChoice {
        choices_of(done, program_type)[0]
    }

    #[test]
    fn five_segments_follow_exhaustion_schedule() {
        let store = catalog(vec![
            program_with_bindings("macro", ProgramType::Macro, "C", &[], &[(0, &[]), (1, &[])]),
            program_with_bindings("main", ProgramType::Main, "C", &[], &[(0, &[]), (1, &[]), (2, &[])]),
        ]);
        let done = run_chain(&store, 5, 1);

        let types: Vec<SegmentType> = done.iter().map(|d| d.segment_type).collect();
        assert_eq!(
            types,
            vec![
                SegmentType::Initial,
                SegmentType::Continue,
                SegmentType::Continue,
                SegmentType::NextMacro,
                SegmentType::Continue,
            ]
        );
        let main_offsets: Vec<u32> = done
            .iter()
            .map(|d| choice_of(d, ProgramType::Main).sequence_binding_offset)
            .collect();
        assert_eq!(main_offsets, vec![0, 1, 2, 0, 1]);
        let macro_offsets: Vec<u32> = done
            .iter()
            .map(|d| choice_of(d, ProgramType::Macro).sequence_binding_offset)
            .collect();
        assert_eq!(macro_offsets, vec![0, 0, 0, 0, 0]);

        let offsets: Vec<u64> = done.iter().map(|d| d.segment.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
        for pair in done.windows(2) {
            assert_eq!(pair[1].segment.begin_at_micros, pair[0].segment.end_at_micros.unwrap());
        }
    }

    #[test]
    fn macro_with_three_offsets_goes_through_next_main() {
        let store = catalog(vec![
            program_with_bindings("macro", ProgramType::Macro, "C", &[], &[(0, &[]), (1, &[]), (2, &[])]),
            program_with_bindings("main", ProgramType::Main, "C", &[], &[(0, &[])]),
        ]);
        let done = run_chain(&store, 3, 2);
        let types: Vec<SegmentType> = done.iter().map(|d| d.segment_type).collect();
        assert_eq!(
            types,
            vec![SegmentType::Initial, SegmentType::NextMain, SegmentType::NextMacro]
        );
        assert_eq!(choice_of(&done[1], ProgramType::Macro).sequence_binding_offset, 1);
        assert_eq!(choice_of(&done[2], ProgramType::Macro).sequence_binding_offset, 0);
    }

    #[test]
    fn next_macro_never_repeats_binding_when_alternatives_exist() {
        let store = catalog(vec![
            program_with_bindings("macro", ProgramType::Macro, "C", &[], &[(0, &[]), (0, &[])]),
            program_with_bindings("main", ProgramType::Main, "C", &[], &[(0, &[])]),
        ]);
        for seed in 0..5 {
            let done = run_chain(&store, 6, seed);
            for pair in done.windows(2) {
                assert_eq!(pair[1].segment_type, SegmentType::NextMacro);
                assert_ne!(
                    choice_of(&pair[0], ProgramType::Macro).program_sequence_binding_id,
                    choice_of(&pair[1], ProgramType::Macro).program_sequence_binding_id
                );
            }
        }
    }

    #[test]
    fn next_macro_switches_between_single_binding_programs() {
        let store = catalog(vec![
            program_with_bindings("ma", ProgramType::Macro, "C", &[], &[(0, &[])]),
            program_with_bindings("mb", ProgramType::Macro, "A minor", &[], &[(0, &[])]),
            program_with_bindings("main", ProgramType::Main, "C", &[], &[(0, &[])]),
        ]);
        for seed in 0..20 {
            let done = run_chain(&store, 10, seed);
            for pair in done.windows(2) {
                assert_eq!(pair[1].segment_type, SegmentType::NextMacro);
                assert_ne!(
                    choice_of(&pair[0], ProgramType::Macro).program_sequence_binding_id,
                    choice_of(&pair[1], ProgramType::Macro).program_sequence_binding_id,
                    "seed {} offset {}",
                    seed,
                    pair[1].segment.offset
                );
            }
        }
    }

    #[test]
    fn same_seed_same_segment() {
        let store = catalog(vec![
            program_with_bindings("m1", ProgramType::Macro, "C", &[], &[(0, &[]), (0, &[]), (1, &[])]),
            program_with_bindings("m2", ProgramType::Macro, "G", &[], &[(0, &[])]),
            program_with_bindings("a", ProgramType::Main, "D minor", &[], &[(0, &[]), (1, &[])]),
            program_with_bindings("b", ProgramType::Main, "F", &[], &[(0, &[])]),
            with_voices(program("r1", ProgramType::Rhythm, "C", &[]), &["Kick", "Snare"]),
            with_voices(program("r2", ProgramType::Rhythm, "C", &[]), &["Hat"]),
        ]);
        assert_eq!(run_chain(&store, 6, 42), run_chain(&store, 6, 42));
    }

    #[test]
    fn committed_memes_are_admissible() {
        let store = catalog(vec![
            program_with_bindings("macro", ProgramType::Macro, "C", &["WINTER"], &[(0, &[])]),
            program_with_bindings("main", ProgramType::Main, "C", &[], &[(0, &["DARK"]), (0, &["BRIGHT"])]),
            program("r-summer", ProgramType::Rhythm, "C", &["SUMMER"]),
            program("r-cold", ProgramType::Rhythm, "C", &["WINTER"]),
        ]);
        let taxonomy = crate::testing::taxonomy();
        for done in run_chain(&store, 4, 5) {
            let names: Vec<&str> = done.memes.iter().map(|m| m.name.as_str()).collect();
            assert!(crate::meme::MemeStack::from(&taxonomy, names.iter()).is_valid());
            assert_eq!(choice_of(&done, ProgramType::Rhythm).program_id, "r-cold");
        }
    }

    #[test]
    fn unresolvable_previous_choice_is_continuity_error() {
        let full = catalog(vec![
            program_with_bindings("macro", ProgramType::Macro, "C", &[], &[(0, &[]), (1, &[])]),
            program_with_bindings("main", ProgramType::Main, "C", &[], &[(0, &[]), (1, &[])]),
        ]);
        let chain = library_chain();
        let config = FabricatorConfig::default();
        let mut segments = MemorySegmentStore::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let first = Segment::planned(&chain.id, 0, 0);
        segments.plan(first.clone()).unwrap();
        let first = segments.begin_crafting(&first.id).unwrap();
        let done = fabricate(&full, &segments, &chain, &first, &config, &mut rng).unwrap();
        segments.commit(&done.segment, &done.choices, &done.memes, &done.chords).unwrap();

        // the catalog lost the Main program between segments
        let partial = catalog(vec![program_with_bindings(
            "macro",
            ProgramType::Macro,
            "C",
            &[],
            &[(0, &[]), (1, &[])],
        )]);
        let second = Segment::planned(&chain.id, 1, done.segment.end_at_micros.unwrap());
        segments.plan(second.clone()).unwrap();
        let second = segments.begin_crafting(&second.id).unwrap();
        let err = fabricate(&partial, &segments, &chain, &second, &config, &mut rng).unwrap_err();
        assert_eq!(err.code, ErrorCode::Continuity);
    }

    #[test]
    fn segment_of_other_chain_rejected() {
        let store = catalog(vec![]);
        let segments = MemorySegmentStore::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let seg = Segment::planned("elsewhere", 0, 0);
        let err = fabricate(
            &store,
            &segments,
            &library_chain(),
            &seg,
            &FabricatorConfig::default(),
            &mut rng,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::StateConflict);
    }
}
