//! lofi-fabricator: segment fabrication engine for continuous music chains.
//!
//! Given a catalog of programs and the history of a chain, the engine decides
//! which programs, sequences and voices play in the next segment, the memes it
//! carries, its key, tempo, density, length and chord progression.
//!
//! # Modules
//!
//! - [`types`]: Entity types (Chain, Segment, Program and their records)
//! - [`config`]: Fabricator configuration (FabricatorConfig, StageWeights)
//! - [`error`]: Error types and codes (FabricationError, ErrorCode)
//! - [`music`]: Keys, notes, chords and transposition
//! - [`meme`]: Meme taxonomy, admissibility and isometry
//! - [`fabricator`]: Segment-type state machine and stage orchestration
//! - [`work`]: Planning and guarded crafting of chain segments
//!
//! # Example
//!
//! ```rust,ignore
//! use lofi_fabricator::{
//!     catalog::ContentStore,
//!     config::FabricatorConfig,
//!     store::MemorySegmentStore,
//!     types::Chain,
//!     work::extend_chain,
//! };
//!
//! let catalog = ContentStore::from_json_file(Path::new("catalog.json"))?;
//! let chain = Chain::from_json_file(Path::new("chain.json"))?;
//! let config = FabricatorConfig { seed: Some(42), ..Default::default() };
//!
//! let mut store = MemorySegmentStore::new();
//! for segment in extend_chain(&mut store, &catalog, &chain, &config, 8)? {
//!     println!("{} {:?}", segment.segment.offset, segment.segment.key);
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod craft;
pub mod error;
pub mod fabricator;
pub mod marble_bag;
pub mod meme;
pub mod music;
pub mod retrospective;
pub mod store;
pub mod types;
pub mod work;

#[cfg(test)]
mod testing;

// Re-export commonly used types at crate root for convenience
pub use config::{FabricatorConfig, StageWeights};
pub use error::{ErrorCode, FabricationError, Result};
pub use fabricator::{fabricate, FabricatedSegment, SegmentType};
pub use types::{compute_entity_id, Chain, Program, ProgramType, Segment, SegmentChoice, SegmentState};
