//! Error types for the fabricator.
//!
//! Defines the error codes and the error type used throughout the engine for
//! consistent error handling and reporting.

use std::fmt;

/// Error codes attached to every fabrication failure.
///
/// These codes let the caller (usually the chain scheduler) decide whether a
/// failed segment should be retried, skipped, or escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A non-initial segment could not resolve a required predecessor choice.
    /// Trigger: previous Macro/Main choice missing or unresolvable in the catalog.
    Continuity,

    /// A craft stage had no candidate left after filtering.
    /// Trigger: no program of the required type bound to the chain, or all of
    /// them rejected by meme admissibility.
    SelectionExhausted,

    /// A segment state transition precondition did not hold.
    /// Trigger: segment not Planned, or another segment of the chain is Crafting.
    StateConflict,

    /// A catalog or store point lookup returned nothing.
    /// Trigger: dangling program, sequence, binding, voice or segment id.
    EntityNotFound,

    /// Musical text could not be parsed.
    /// Trigger: malformed key, chord or note name.
    InvalidMusic,

    /// Configuration is out of range.
    /// Trigger: negative weights, zero floor, zero detail limit.
    InvalidConfig,

    /// A catalog or chain file could not be read or decoded.
    /// Trigger: missing file, malformed JSON.
    CatalogLoad,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Continuity => "CONTINUITY",
            ErrorCode::SelectionExhausted => "SELECTION_EXHAUSTED",
            ErrorCode::StateConflict => "STATE_CONFLICT",
            ErrorCode::EntityNotFound => "ENTITY_NOT_FOUND",
            ErrorCode::InvalidMusic => "INVALID_MUSIC",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::CatalogLoad => "CATALOG_LOAD",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::Continuity => "Previous segment choice required for continuity is missing",
            ErrorCode::SelectionExhausted => "No admissible candidate remained for a craft stage",
            ErrorCode::StateConflict => "Segment state transition precondition failed",
            ErrorCode::EntityNotFound => "Referenced entity does not exist",
            ErrorCode::InvalidMusic => "Key, chord or note text could not be parsed",
            ErrorCode::InvalidConfig => "Fabricator configuration is invalid",
            ErrorCode::CatalogLoad => "Catalog or chain file could not be loaded",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::Continuity => {
                "Leave the segment Planned and retry later, or revert the chain to the last \
                 segment whose choices are intact"
            }
            ErrorCode::SelectionExhausted => {
                "Bind more programs of the required type to the chain, or loosen the meme \
                 taxonomy so candidates are not all excluded"
            }
            ErrorCode::StateConflict => {
                "Wait for the segment currently crafting in this chain to finish, then retry"
            }
            ErrorCode::EntityNotFound => {
                "Reload the catalog snapshot; a program or segment referenced by id is missing"
            }
            ErrorCode::InvalidMusic => {
                "Fix the key or chord text in the catalog (e.g. 'C# Minor', 'Bbmaj7/D')"
            }
            ErrorCode::InvalidConfig => {
                "Use non-negative weights, a positive weight floor and a detail limit of at least 1"
            }
            ErrorCode::CatalogLoad => "Check the file path and that it contains valid JSON",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for fabrication operations.
#[derive(Debug)]
pub struct FabricationError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FabricationError {
    /// Creates a new FabricationError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new FabricationError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a CONTINUITY error.
    pub fn continuity(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Continuity, reason)
    }

    /// Creates a SELECTION_EXHAUSTED error for the given program type label.
    pub fn no_candidate(kind: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::SelectionExhausted,
            format!("No candidate {}-type program bound to chain", kind),
        )
    }

    /// Creates a STATE_CONFLICT error.
    pub fn state_conflict(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, reason)
    }

    /// Creates an ENTITY_NOT_FOUND error.
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{}[{}] not found", entity, id),
        )
    }

    /// Creates an INVALID_MUSIC error.
    pub fn invalid_music(text: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidMusic,
            format!("Cannot parse '{}': {}", text, reason.into()),
        )
    }

    /// Creates an INVALID_CONFIG error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, reason)
    }

    /// Creates a CATALOG_LOAD error wrapping the underlying cause.
    pub fn catalog_load(
        what: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::with_source(
            ErrorCode::CatalogLoad,
            format!("Failed to load {}", what.into()),
            source,
        )
    }

    /// Returns true if the error aborts the segment (everything except
    /// per-candidate musical faults, which callers may skip).
    pub fn is_fatal(&self) -> bool {
        !matches!(self.code, ErrorCode::InvalidMusic)
    }
}

impl fmt::Display for FabricationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for FabricationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using FabricationError.
pub type Result<T> = std::result::Result<T, FabricationError>;
