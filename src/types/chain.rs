//! Chain type: one continuously fabricated output stream.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FabricationError, Result};

/// Purpose of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// Long-running stream.
    #[default]
    Production,
    /// Short-lived audition of a catalog.
    Preview,
}

/// Lifecycle state of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainState {
    /// Configured, not yet fabricating.
    #[default]
    Ready,
    /// Segments are being planned and crafted.
    Fabricate,
    /// Reached its stop time.
    Complete,
    /// Stopped after an unrecoverable error.
    Failed,
}

impl ChainState {
    /// Returns true if the chain will never fabricate again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChainState::Complete | ChainState::Failed)
    }

    /// Returns true if new segments may be planned.
    pub fn is_fabricating(&self) -> bool {
        matches!(self, ChainState::Fabricate)
    }
}

/// What a chain binding points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainBindingType {
    /// Every program of a library becomes a fallback candidate.
    Library,
    /// A single program becomes a preferred candidate.
    Program,
}

/// Binds a library or a program to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBinding {
    #[serde(rename = "type")]
    pub binding_type: ChainBindingType,
    pub target_id: String,
}

impl ChainBinding {
    pub fn library(id: &str) -> Self {
        Self {
            binding_type: ChainBindingType::Library,
            target_id: id.to_string(),
        }
    }

    pub fn program(id: &str) -> Self {
        Self {
            binding_type: ChainBindingType::Program,
            target_id: id.to_string(),
        }
    }
}

/// An ordered, continuously extended sequence of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub chain_type: ChainType,
    #[serde(default)]
    pub state: ChainState,
    /// Start of the fabrication window in microseconds.
    #[serde(default)]
    pub start_at_micros: u64,
    /// End of the fabrication window; None runs forever.
    #[serde(default)]
    pub stop_at_micros: Option<u64>,
    #[serde(default)]
    pub bindings: Vec<ChainBinding>,
}

impl Chain {
    /// True if `program_id` is bound directly to the chain.
    pub fn binds_program(&self, program_id: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.binding_type == ChainBindingType::Program && b.target_id == program_id)
    }

    /// True if `library_id` is bound to the chain.
    pub fn binds_library(&self, library_id: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.binding_type == ChainBindingType::Library && b.target_id == library_id)
    }

    /// Reads a chain from a JSON file and validates it.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FabricationError::catalog_load(path.display().to_string(), e))?;
        let chain: Self = serde_json::from_str(&text)
            .map_err(|e| FabricationError::catalog_load(path.display().to_string(), e))?;
        if let Some(reason) = chain.validate() {
            return Err(FabricationError::invalid_config(reason));
        }
        Ok(chain)
    }

    /// Validates the chain.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.id.is_empty() {
            return Some("Chain ID cannot be empty".to_string());
        }
        if let Some(stop) = self.stop_at_micros {
            if stop <= self.start_at_micros {
                return Some(format!(
                    "Chain stop ({}) must be after start ({})",
                    stop, self.start_at_micros
                ));
            }
        }
        if self.bindings.is_empty() {
            return Some(format!("Chain[{}] has no bindings", self.id));
        }
        None
    }
}
