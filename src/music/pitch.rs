//! Pitch classes, accidentals and octave-qualified notes.

use std::fmt;

use crate::error::{FabricationError, Result};

/// Spelling preference used when rendering a pitch class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accidental {
    #[default]
    Sharp,
    Flat,
}

/// One of the twelve pitch classes, 0 = C through 11 = B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PitchClass(u8);

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);

    /// Creates a pitch class from any semitone count, wrapping into 0-11.
    pub fn from_semitones(semitones: i32) -> Self {
        PitchClass(semitones.rem_euclid(12) as u8)
    }

    /// Semitone index 0-11.
    pub fn index(self) -> u8 {
        self.0
    }

    /// Shifts by a signed number of semitones.
    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_semitones(self.0 as i32 + semitones)
    }

    /// Renders the pitch class with the given spelling.
    pub fn name(self, accidental: Accidental) -> &'static str {
        match accidental {
            Accidental::Sharp => SHARP_NAMES[self.0 as usize],
            Accidental::Flat => FLAT_NAMES[self.0 as usize],
        }
    }

    /// Parses a leading note name (letter plus optional accidental) from `text`.
    ///
    /// Returns the pitch class, the spelling it was written in, and the
    /// number of bytes consumed. The letter is case-insensitive.
    pub fn parse_prefix(text: &str) -> Result<(Self, Accidental, usize)> {
        let mut chars = text.char_indices();
        let (_, letter) = chars
            .next()
            .ok_or_else(|| FabricationError::invalid_music(text, "empty note name"))?;
        let natural: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(FabricationError::invalid_music(text, "note must start with A-G")),
        };
        let mut consumed = letter.len_utf8();
        let mut accidental = Accidental::Sharp;
        let mut offset = 0;
        if let Some((_, next)) = chars.next() {
            match next {
                '#' | '♯' => {
                    offset = 1;
                    consumed += next.len_utf8();
                }
                'b' | '♭' => {
                    offset = -1;
                    accidental = Accidental::Flat;
                    consumed += next.len_utf8();
                }
                _ => {}
            }
        }
        Ok((Self::from_semitones(natural + offset), accidental, consumed))
    }
}

/// A pitch class in a specific octave, e.g. `C4` or `Bb2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i32,
    pub accidental: Accidental,
}

impl Note {
    /// Parses a note such as `F#3`. A missing octave defaults to 4.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let (pitch_class, accidental, consumed) = PitchClass::parse_prefix(trimmed)?;
        let rest = &trimmed[consumed..];
        let octave = if rest.is_empty() {
            4
        } else {
            rest.parse::<i32>()
                .map_err(|_| FabricationError::invalid_music(text, "octave must be an integer"))?
        };
        Ok(Self {
            pitch_class,
            octave,
            accidental,
        })
    }

    /// Shifts by a signed number of semitones, carrying across octave boundaries.
    pub fn transpose(self, semitones: i32) -> Self {
        let absolute = self.octave * 12 + self.pitch_class.index() as i32 + semitones;
        Self {
            pitch_class: PitchClass::from_semitones(absolute),
            octave: absolute.div_euclid(12),
            accidental: self.accidental,
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class.name(self.accidental), self.octave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefix_reads_accidentals() {
        assert_eq!(PitchClass::parse_prefix("C").unwrap().0.index(), 0);
        assert_eq!(PitchClass::parse_prefix("C#m7").unwrap(), (PitchClass(1), Accidental::Sharp, 2));
        assert_eq!(PitchClass::parse_prefix("Bb").unwrap(), (PitchClass(10), Accidental::Flat, 2));
        assert_eq!(PitchClass::parse_prefix("Cb").unwrap().0.index(), 11);
        assert_eq!(PitchClass::parse_prefix("e").unwrap().0.index(), 4);
        assert!(PitchClass::parse_prefix("H").is_err());
        assert!(PitchClass::parse_prefix("").is_err());
    }

    #[test]
    fn pitch_class_wraps() {
        assert_eq!(PitchClass::from_semitones(-1).index(), 11);
        assert_eq!(PitchClass::from_semitones(25).index(), 1);
        assert_eq!(PitchClass::C.transpose(-13).index(), 11);
    }

    #[test]
    fn note_transpose_carries_octave() {
        let c4 = Note::parse("C4").unwrap();
        assert_eq!(c4.transpose(-1).to_string(), "B3");
        assert_eq!(c4.transpose(12).to_string(), "C5");

        let bb2 = Note::parse("Bb2").unwrap();
        assert_eq!(bb2.transpose(2).to_string(), "C3");
        assert_eq!(bb2.transpose(1).to_string(), "B2");
    }

    #[test]
    fn note_default_octave() {
        assert_eq!(Note::parse("G").unwrap().octave, 4);
        assert!(Note::parse("G#x").is_err());
    }
}
