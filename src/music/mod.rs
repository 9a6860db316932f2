//! Pitch, key and chord arithmetic.
//!
//! Pure functions only: nothing here touches the catalog or randomness.

pub mod chord;
pub mod key;
pub mod pitch;

pub use chord::{transpose_chord, transpose_voicing, Chord};
pub use key::{delta, delta_text, transpose, Key, Mode};
pub use pitch::{Accidental, Note, PitchClass};
