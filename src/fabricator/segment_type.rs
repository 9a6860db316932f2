//! Segment type state machine.
//!
//! The type of a segment is never stored. It is derived once per fabrication
//! from how far the previous segment's Main and Macro choices still have to go.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a segment relates to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    /// First segment of a chain, or no usable predecessor.
    Initial,
    /// Same Macro and Main programs, Main advances one binding offset.
    Continue,
    /// Same Macro program advanced one offset, fresh Main program.
    NextMain,
    /// Fresh Macro and Main programs.
    NextMacro,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Initial => "Initial",
            SegmentType::Continue => "Continue",
            SegmentType::NextMain => "NextMain",
            SegmentType::NextMacro => "NextMacro",
        }
    }

    /// True when the previous segment's choices take part in scoring.
    pub fn has_predecessor(&self) -> bool {
        !matches!(self, SegmentType::Initial)
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derives the segment type.
///
/// `main_further` and `macro_further` count the distinct binding offsets of
/// the previous Main and Macro programs that come after the offsets the
/// previous segment used. None means the previous segment had no such choice.
pub fn determine_type(
    offset: u64,
    main_further: Option<usize>,
    macro_further: Option<usize>,
) -> SegmentType {
    if offset == 0 {
        return SegmentType::Initial;
    }
    match (main_further, macro_further) {
        (Some(main), Some(_)) if main >= 1 => SegmentType::Continue,
        (Some(_), Some(macro_)) if macro_ >= 2 => SegmentType::NextMain,
        (Some(_), Some(_)) => SegmentType::NextMacro,
        _ => SegmentType::Initial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_zero_is_always_initial() {
        assert_eq!(determine_type(0, Some(3), Some(3)), SegmentType::Initial);
        assert_eq!(determine_type(0, None, None), SegmentType::Initial);
    }

    #[test]
    fn missing_predecessor_choice_is_initial() {
        assert_eq!(determine_type(4, None, Some(2)), SegmentType::Initial);
        assert_eq!(determine_type(4, Some(1), None), SegmentType::Initial);
    }

    #[test]
    fn main_with_remaining_offset_continues() {
        assert_eq!(determine_type(1, Some(1), Some(0)), SegmentType::Continue);
        assert_eq!(determine_type(1, Some(5), Some(5)), SegmentType::Continue);
    }

    #[test]
    fn exhausted_main_advances_macro_when_two_remain() {
        assert_eq!(determine_type(3, Some(0), Some(2)), SegmentType::NextMain);
        assert_eq!(determine_type(3, Some(0), Some(7)), SegmentType::NextMain);
    }

    #[test]
    fn exhausted_macro_starts_over() {
        assert_eq!(determine_type(3, Some(0), Some(1)), SegmentType::NextMacro);
        assert_eq!(determine_type(3, Some(0), Some(0)), SegmentType::NextMacro);
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(SegmentType::NextMain.to_string(), "NextMain");
        assert!(!SegmentType::Initial.has_predecessor());
        assert!(SegmentType::Continue.has_predecessor());
    }
}
