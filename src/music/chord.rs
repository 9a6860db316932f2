//! Chord symbols and voicings, and their transposition.

use std::fmt;

use super::pitch::{Accidental, Note, PitchClass};
use crate::error::{FabricationError, Result};

/// A chord symbol: root, descriptor and optional slash bass, e.g. `F#m7/C#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    pub root: PitchClass,
    pub accidental: Accidental,
    /// Everything between the root and the slash, e.g. `m7` or `maj9`.
    pub descriptor: String,
    pub bass: Option<PitchClass>,
}

impl Chord {
    /// Parses a chord symbol. The descriptor is kept verbatim.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(FabricationError::invalid_music(text, "empty chord"));
        }
        // A slash followed by anything other than a bare note (e.g. `C6/9`)
        // belongs to the descriptor.
        let (body, bass) = match trimmed.rsplit_once('/') {
            Some((body, tail)) => match PitchClass::parse_prefix(tail.trim()) {
                Ok((pc, _, used)) if used == tail.trim().len() => (body, Some(pc)),
                _ => (trimmed, None),
            },
            None => (trimmed, None),
        };
        let (root, accidental, consumed) = PitchClass::parse_prefix(body)?;
        let descriptor = body[consumed..].trim().to_string();
        Ok(Self {
            root,
            accidental,
            descriptor,
            bass,
        })
    }

    /// Shifts root and bass by a signed number of semitones.
    pub fn transpose(&self, semitones: i32) -> Self {
        Self {
            root: self.root.transpose(semitones),
            accidental: self.accidental,
            descriptor: self.descriptor.clone(),
            bass: self.bass.map(|b| b.transpose(semitones)),
        }
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root.name(self.accidental), self.descriptor)?;
        if let Some(bass) = self.bass {
            write!(f, "/{}", bass.name(self.accidental))?;
        }
        Ok(())
    }
}

/// Transposes chord text, e.g. `transpose_chord("Bbmaj7/D", 2) == "Cmaj7/E"`.
pub fn transpose_chord(text: &str, semitones: i32) -> Result<String> {
    Ok(Chord::parse(text)?.transpose(semitones).to_string())
}

/// Transposes a comma-separated voicing note list, e.g. `"C4, E4, G4"`.
/// Blank entries are dropped.
pub fn transpose_voicing(notes: &str, semitones: i32) -> Result<String> {
    let mut out = Vec::new();
    for raw in notes.split(',') {
        if raw.trim().is_empty() {
            continue;
        }
        out.push(Note::parse(raw)?.transpose(semitones).to_string());
    }
    Ok(out.join(", "))
}
