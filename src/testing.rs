//! Catalog and chain fixtures shared by unit tests.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::catalog::ContentStore;
use crate::config::FabricatorConfig;
use crate::fabricator::{fabricate, FabricatedSegment};
use crate::meme::{MemeCategory, MemeTaxonomy};
use crate::store::{MemorySegmentStore, SegmentWriter};
use crate::types::{
    Chain, ChainBinding, ChainState, ChainType, Program, ProgramConfig, ProgramSequence,
    ProgramType, ProgramVoice, Segment, SegmentChoice, SequenceBinding,
};

pub const LIBRARY: &str = "lib";

pub fn taxonomy() -> MemeTaxonomy {
    MemeTaxonomy::new(vec![
        MemeCategory::new("SEASON", &["WINTER", "SUMMER"]),
        MemeCategory::new("MOOD", &["DARK", "BRIGHT"]),
    ])
}

fn sequence(id: String, total: u32) -> ProgramSequence {
    ProgramSequence {
        id,
        name: "Sequence".to_string(),
        key: None,
        tempo: None,
        density: None,
        total,
        patterns: Vec::new(),
        chords: Vec::new(),
    }
}

/// A program with a single unbound sequence.
pub fn program(id: &str, program_type: ProgramType, key: &str, memes: &[&str]) -> Program {
    Program {
        id: id.to_string(),
        library_id: LIBRARY.to_string(),
        name: id.to_uppercase(),
        program_type,
        key: key.to_string(),
        tempo: 120.0,
        density: 0.5,
        memes: memes.iter().map(|m| m.to_string()).collect(),
        config: ProgramConfig::default(),
        sequences: vec![sequence(format!("{}-s", id), 16)],
        bindings: Vec::new(),
        voices: Vec::new(),
    }
}

/// A program with one 16-beat sequence per `(offset, memes)` binding.
pub fn program_with_bindings(
    id: &str,
    program_type: ProgramType,
    key: &str,
    memes: &[&str],
    bindings: &[(u32, &[&str])],
) -> Program {
    let mut p = program(id, program_type, key, memes);
    p.sequences.clear();
    for (i, (offset, binding_memes)) in bindings.iter().enumerate() {
        let sequence_id = format!("{}-s{}", id, i);
        p.sequences.push(sequence(sequence_id.clone(), 16));
        p.bindings.push(SequenceBinding {
            id: format!("{}-b{}", id, i),
            sequence_id,
            offset: *offset,
            memes: binding_memes.iter().map(|m| m.to_string()).collect(),
        });
    }
    p
}

/// Adds named voices with ids `<program>-v<n>`.
pub fn with_voices(mut p: Program, names: &[&str]) -> Program {
    for (i, name) in names.iter().enumerate() {
        p.voices.push(ProgramVoice {
            id: format!("{}-v{}", p.id, i),
            name: name.to_string(),
        });
    }
    p
}

pub fn catalog(programs: Vec<Program>) -> ContentStore {
    ContentStore::new(taxonomy(), programs).expect("fixture catalog is valid")
}

/// A fabricating chain bound to the fixture library.
pub fn library_chain() -> Chain {
    Chain {
        id: "chain".to_string(),
        name: "Test Chain".to_string(),
        chain_type: ChainType::Preview,
        state: ChainState::Fabricate,
        start_at_micros: 0,
        stop_at_micros: None,
        bindings: vec![ChainBinding::library(LIBRARY)],
    }
}

/// Fabricates and commits `count` consecutive segments of [`library_chain`].
pub fn fabricate_chain(
    store: &ContentStore,
    config: &FabricatorConfig,
    count: u64,
    seed: u64,
) -> Vec<FabricatedSegment> {
    let chain = library_chain();
    let mut segments = MemorySegmentStore::new();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Vec::new();
    let mut begin = 0;
    for offset in 0..count {
        let planned = Segment::planned(&chain.id, offset, begin);
        segments.plan(planned.clone()).expect("plan");
        let seg = segments.begin_crafting(&planned.id).expect("begin crafting");
        let done = fabricate(store, &segments, &chain, &seg, config, &mut rng).expect("fabricate");
        segments
            .commit(&done.segment, &done.choices, &done.memes, &done.chords)
            .expect("commit");
        begin = done.segment.end_at_micros.expect("crafted segment has an end");
        out.push(done);
    }
    out
}

/// Choices of one program type, in commit order.
pub fn choices_of(done: &FabricatedSegment, program_type: ProgramType) -> Vec<&SegmentChoice> {
    done.choices
        .iter()
        .filter(|c| c.program_type == program_type)
        .collect()
}
