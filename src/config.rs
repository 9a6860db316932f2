//! Fabricator configuration module.
//!
//! Contains the scoring weights used by each craft stage, the marble bag
//! weight floor, the detail program limit and the optional reproducibility seed.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FabricationError, Result};

/// Scoring weights for one craft stage.
///
/// A candidate's score is
/// `N(0, entropy) + isometry * (previousMatches + accumulatedMatches) + mode_match (if modes equal) - repeat_penalty (if repeat)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageWeights {
    /// Standard deviation of the Gaussian entropy term.
    pub entropy: f64,

    /// Weight applied to each matching meme.
    pub isometry: f64,

    /// Bonus when the candidate's key mode equals the reference mode.
    pub mode_match: f64,

    /// Penalty when the candidate repeats the previous analogous choice.
    pub repeat_penalty: f64,
}

impl StageWeights {
    /// Weights used by Macro and Main craft.
    pub const fn sequence_stage() -> Self {
        Self {
            entropy: 0.5,
            isometry: 10.0,
            mode_match: 2.0,
            repeat_penalty: 5.0,
        }
    }

    /// Weights used by Rhythm, Beat and Detail craft.
    pub const fn voice_stage() -> Self {
        Self {
            entropy: 0.5,
            isometry: 5.0,
            mode_match: 2.0,
            repeat_penalty: 5.0,
        }
    }

    fn validate(&self, stage: &str) -> Option<String> {
        let fields = [
            ("entropy", self.entropy),
            ("isometry", self.isometry),
            ("mode_match", self.mode_match),
            ("repeat_penalty", self.repeat_penalty),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Some(format!("{}.{} must be finite and >= 0, got {}", stage, name, value));
            }
        }
        None
    }
}

impl Default for StageWeights {
    fn default() -> Self {
        Self::sequence_stage()
    }
}

/// Runtime configuration for the fabricator.
///
/// Typically loaded from a JSON file or environment variables at startup,
/// then shared read-only by every segment fabrication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricatorConfig {
    /// Weights for Macro craft.
    pub macro_weights: StageWeights,

    /// Weights for Main craft.
    pub main_weights: StageWeights,

    /// Weights for Rhythm and Beat craft.
    pub rhythm_weights: StageWeights,

    /// Weights for Detail craft.
    pub detail_weights: StageWeights,

    /// Small positive value added to every marble bag weight so that
    /// negative-scored candidates stay drawable.
    pub weight_floor: f64,

    /// Maximum number of distinct Detail programs chosen per segment.
    pub detail_program_limit: usize,

    /// Base seed for reproducible fabrication.
    /// If None, every segment draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for FabricatorConfig {
    fn default() -> Self {
        Self {
            macro_weights: StageWeights::sequence_stage(),
            main_weights: StageWeights::sequence_stage(),
            rhythm_weights: StageWeights::voice_stage(),
            detail_weights: StageWeights::voice_stage(),
            weight_floor: 0.01,
            detail_program_limit: 2,
            seed: None,
        }
    }
}

impl FabricatorConfig {
    /// Creates a new FabricatorConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a FabricatorConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `LOFI_FAB_SEED` - Base seed for reproducible fabrication
    /// - `LOFI_FAB_WEIGHT_FLOOR` - Marble bag weight floor (> 0)
    /// - `LOFI_FAB_DETAIL_LIMIT` - Max Detail programs per segment (>= 1)
    /// - `LOFI_FAB_ENTROPY` - Entropy sigma applied to every stage (>= 0)
    ///
    /// Falls back to defaults for unset or invalid variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(seed_str) = std::env::var("LOFI_FAB_SEED") {
            if let Ok(seed) = seed_str.trim().parse::<u64>() {
                config.seed = Some(seed);
            }
        }

        if let Ok(floor_str) = std::env::var("LOFI_FAB_WEIGHT_FLOOR") {
            if let Ok(floor) = floor_str.trim().parse::<f64>() {
                if floor.is_finite() && floor > 0.0 {
                    config.weight_floor = floor;
                }
            }
        }

        if let Ok(limit_str) = std::env::var("LOFI_FAB_DETAIL_LIMIT") {
            if let Ok(limit) = limit_str.trim().parse::<usize>() {
                if limit > 0 {
                    config.detail_program_limit = limit;
                }
            }
        }

        if let Ok(entropy_str) = std::env::var("LOFI_FAB_ENTROPY") {
            if let Ok(entropy) = entropy_str.trim().parse::<f64>() {
                if entropy.is_finite() && entropy >= 0.0 {
                    config.macro_weights.entropy = entropy;
                    config.main_weights.entropy = entropy;
                    config.rhythm_weights.entropy = entropy;
                    config.detail_weights.entropy = entropy;
                }
            }
        }

        config
    }

    /// Loads a FabricatorConfig from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FabricationError::catalog_load(path.display().to_string(), e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| FabricationError::catalog_load(path.display().to_string(), e))?;
        if let Some(reason) = config.validate() {
            return Err(FabricationError::invalid_config(reason));
        }
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if let Some(msg) = self.macro_weights.validate("macro_weights") {
            return Some(msg);
        }
        if let Some(msg) = self.main_weights.validate("main_weights") {
            return Some(msg);
        }
        if let Some(msg) = self.rhythm_weights.validate("rhythm_weights") {
            return Some(msg);
        }
        if let Some(msg) = self.detail_weights.validate("detail_weights") {
            return Some(msg);
        }
        if !self.weight_floor.is_finite() || self.weight_floor <= 0.0 {
            return Some(format!("weight_floor must be > 0, got {}", self.weight_floor));
        }
        if self.detail_program_limit == 0 {
            return Some("detail_program_limit must be >= 1".to_string());
        }
        None
    }
}
