//! In-memory catalog loaded from JSON, indexed by id.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::{BindingScope, Catalog};
use crate::error::{ErrorCode, FabricationError, Result};
use crate::meme::MemeTaxonomy;
use crate::types::{Chain, Program, ProgramSequence, ProgramType, ProgramVoice, SequenceBinding};

/// Taxonomy as written in a catalog file: either the `NAME[A, B]` text
/// format or a list of category objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaxonomySource {
    Text(String),
    Categories(MemeTaxonomy),
}

impl Default for TaxonomySource {
    fn default() -> Self {
        TaxonomySource::Categories(MemeTaxonomy::empty())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    meme_taxonomy: TaxonomySource,
    #[serde(default)]
    programs: Vec<Program>,
}

/// Immutable program catalog with id indexes.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    taxonomy: MemeTaxonomy,
    programs: Vec<Program>,
    /// program id -> program index
    program_index: HashMap<String, usize>,
    /// sequence id -> (program index, sequence index)
    sequence_index: HashMap<String, (usize, usize)>,
    /// binding id -> (program index, binding index)
    binding_index: HashMap<String, (usize, usize)>,
    /// voice id -> (program index, voice index)
    voice_index: HashMap<String, (usize, usize)>,
}

impl ContentStore {
    /// Builds a store, validating programs and rejecting duplicate ids.
    pub fn new(taxonomy: MemeTaxonomy, programs: Vec<Program>) -> Result<Self> {
        let mut store = Self {
            taxonomy,
            ..Self::default()
        };
        for (pi, program) in programs.iter().enumerate() {
            if let Some(reason) = program.validate() {
                return Err(FabricationError::new(ErrorCode::CatalogLoad, reason));
            }
            insert_unique(&mut store.program_index, &program.id, pi)?;
            for (si, sequence) in program.sequences.iter().enumerate() {
                insert_unique(&mut store.sequence_index, &sequence.id, (pi, si))?;
            }
            for (bi, binding) in program.bindings.iter().enumerate() {
                insert_unique(&mut store.binding_index, &binding.id, (pi, bi))?;
            }
            for (vi, voice) in program.voices.iter().enumerate() {
                insert_unique(&mut store.voice_index, &voice.id, (pi, vi))?;
            }
        }
        store.programs = programs;
        Ok(store)
    }

    /// Parses a catalog JSON document:
    /// `{"meme_taxonomy": "SEASON[WINTER, SUMMER]" | [...], "programs": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| FabricationError::catalog_load("catalog JSON", e))?;
        let taxonomy = match file.meme_taxonomy {
            TaxonomySource::Text(text) => text.parse::<MemeTaxonomy>()?,
            TaxonomySource::Categories(taxonomy) => taxonomy,
        };
        Self::new(taxonomy, file.programs)
    }

    /// Reads and parses a catalog JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FabricationError::catalog_load(path.display().to_string(), e))?;
        let store = Self::from_json_str(&text)?;
        info!(
            path = %path.display(),
            programs = store.programs.len(),
            categories = store.taxonomy.categories().len(),
            "Loaded catalog"
        );
        Ok(store)
    }

    /// Returns the number of programs in the catalog.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Returns true if the catalog has no programs.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

fn insert_unique<V>(index: &mut HashMap<String, V>, id: &str, value: V) -> Result<()> {
    if index.insert(id.to_string(), value).is_some() {
        return Err(FabricationError::new(
            ErrorCode::CatalogLoad,
            format!("Duplicate id {} in catalog", id),
        ));
    }
    Ok(())
}

impl Catalog for ContentStore {
    fn program(&self, id: &str) -> Result<&Program> {
        self.program_index
            .get(id)
            .map(|&pi| &self.programs[pi])
            .ok_or_else(|| FabricationError::not_found("Program", id))
    }

    fn sequence(&self, id: &str) -> Result<(&Program, &ProgramSequence)> {
        self.sequence_index
            .get(id)
            .map(|&(pi, si)| (&self.programs[pi], &self.programs[pi].sequences[si]))
            .ok_or_else(|| FabricationError::not_found("ProgramSequence", id))
    }

    fn sequence_binding(&self, id: &str) -> Result<(&Program, &SequenceBinding)> {
        self.binding_index
            .get(id)
            .map(|&(pi, bi)| (&self.programs[pi], &self.programs[pi].bindings[bi]))
            .ok_or_else(|| FabricationError::not_found("ProgramSequenceBinding", id))
    }

    fn voice(&self, id: &str) -> Result<(&Program, &ProgramVoice)> {
        self.voice_index
            .get(id)
            .map(|&(pi, vi)| (&self.programs[pi], &self.programs[pi].voices[vi]))
            .ok_or_else(|| FabricationError::not_found("ProgramVoice", id))
    }

    fn programs(&self, chain: &Chain, program_type: ProgramType, scope: BindingScope) -> Vec<&Program> {
        self.programs
            .iter()
            .filter(|p| p.program_type == program_type)
            .filter(|p| match scope {
                BindingScope::Direct => chain.binds_program(&p.id),
                BindingScope::Library => {
                    !chain.binds_program(&p.id) && chain.binds_library(&p.library_id)
                }
            })
            .collect()
    }

    fn meme_taxonomy(&self) -> &MemeTaxonomy {
        &self.taxonomy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChainBinding, ChainState, ChainType};
    use std::io::Write;

    const CATALOG: &str = r#"{
        "meme_taxonomy": "SEASON[WINTER, SUMMER]",
        "programs": [
            {"id":"m1","library_id":"lib1","name":"Macro","type":"Macro","key":"C","tempo":120,"density":0.5,
             "sequences":[{"id":"m1s","name":"A","total":16}],
             "bindings":[{"id":"m1b0","sequence_id":"m1s","offset":0}]},
            {"id":"r1","library_id":"lib1","name":"Rhythm","type":"Rhythm","key":"C","tempo":120,"density":0.5,
             "voices":[{"id":"r1v","name":"Kick"}]},
            {"id":"r2","library_id":"lib2","name":"Other","type":"Rhythm","key":"C","tempo":120,"density":0.5}
        ]
    }"#;

    fn chain(bindings: Vec<ChainBinding>) -> Chain {
        Chain {
            id: "c".to_string(),
            name: "c".to_string(),
            chain_type: ChainType::Production,
            state: ChainState::Fabricate,
            start_at_micros: 0,
            stop_at_micros: None,
            bindings,
        }
    }

    #[test]
    fn load_and_lookup() {
        let store = ContentStore::from_json_str(CATALOG).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.meme_taxonomy().categories().len(), 1);
        assert_eq!(store.program("m1").unwrap().name, "Macro");
        assert_eq!(store.sequence("m1s").unwrap().0.id, "m1");
        assert_eq!(store.sequence_binding("m1b0").unwrap().1.offset, 0);
        assert_eq!(store.voice("r1v").unwrap().1.name, "Kick");
        let err = store.program("nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }

    #[test]
    fn direct_binding_excluded_from_library_scope() {
        let store = ContentStore::from_json_str(CATALOG).unwrap();
        let c = chain(vec![ChainBinding::library("lib1"), ChainBinding::program("r2")]);

        let direct: Vec<&str> = store
            .programs(&c, ProgramType::Rhythm, BindingScope::Direct)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        let library: Vec<&str> = store
            .programs(&c, ProgramType::Rhythm, BindingScope::Library)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(direct, vec!["r2"]);
        assert_eq!(library, vec!["r1"]);
        assert!(store.has_candidates(&c, ProgramType::Macro));
        assert!(!store.has_candidates(&c, ProgramType::Detail));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let json = r#"{"programs":[
            {"id":"a","library_id":"l","name":"A","type":"Main","key":"C","tempo":100,"density":0.5},
            {"id":"a","library_id":"l","name":"B","type":"Main","key":"C","tempo":100,"density":0.5}
        ]}"#;
        let err = ContentStore::from_json_str(json).unwrap_err();
        assert_eq!(err.code, ErrorCode::CatalogLoad);
        assert!(err.message.contains("Duplicate"));
    }

    #[test]
    fn taxonomy_as_category_list() {
        let json = r#"{"meme_taxonomy":[{"name":"MOOD","memes":["DARK","LIGHT"]}],"programs":[]}"#;
        let store = ContentStore::from_json_str(json).unwrap();
        assert!(store.meme_taxonomy().exclusive_categories_of("DARK").next().is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn from_json_file_reads_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let store = ContentStore::from_json_file(file.path()).unwrap();
        assert_eq!(store.len(), 3);

        let err = ContentStore::from_json_file(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert_eq!(err.code, ErrorCode::CatalogLoad);
    }

    #[test]
    fn malformed_json_is_catalog_load_error() {
        let err = ContentStore::from_json_str("{not json").unwrap_err();
        assert_eq!(err.code, ErrorCode::CatalogLoad);
    }
}
