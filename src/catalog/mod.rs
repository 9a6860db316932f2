//! Catalog provider: read-only access to programs and the meme taxonomy.
//!
//! The catalog is an immutable snapshot for the duration of one segment's
//! fabrication. Craft stages scan it by (chain, program type, binding scope)
//! and resolve committed choices through point lookups.

mod content;

pub use content::ContentStore;

use crate::error::Result;
use crate::meme::MemeTaxonomy;
use crate::types::{Chain, Program, ProgramSequence, ProgramType, ProgramVoice, SequenceBinding};

/// How a program is reachable from a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingScope {
    /// Program bound to the chain directly.
    Direct,
    /// Program reachable through a library bound to the chain.
    Library,
}

impl BindingScope {
    /// Marble bag phase for candidates of this scope. Direct bindings are preferred.
    pub fn phase(&self) -> u32 {
        match self {
            BindingScope::Direct => 1,
            BindingScope::Library => 2,
        }
    }

    pub fn all() -> [BindingScope; 2] {
        [BindingScope::Direct, BindingScope::Library]
    }
}

/// Read-only catalog of programs for fabrication.
pub trait Catalog {
    /// Looks up a program by id.
    fn program(&self, id: &str) -> Result<&Program>;

    /// Looks up a sequence by id, with its owning program.
    fn sequence(&self, id: &str) -> Result<(&Program, &ProgramSequence)>;

    /// Looks up a sequence binding by id, with its owning program.
    fn sequence_binding(&self, id: &str) -> Result<(&Program, &SequenceBinding)>;

    /// Looks up a voice by id, with its owning program.
    fn voice(&self, id: &str) -> Result<(&Program, &ProgramVoice)>;

    /// Programs of `program_type` reachable from `chain` in `scope`, in catalog order.
    /// A program bound directly is never also returned for the library scope.
    fn programs(&self, chain: &Chain, program_type: ProgramType, scope: BindingScope) -> Vec<&Program>;

    /// Taxonomy governing which memes may coexist.
    fn meme_taxonomy(&self) -> &MemeTaxonomy;

    /// True if any program of the type is reachable from the chain at all.
    fn has_candidates(&self, chain: &Chain, program_type: ProgramType) -> bool {
        BindingScope::all()
            .iter()
            .any(|scope| !self.programs(chain, program_type, *scope).is_empty())
    }
}
