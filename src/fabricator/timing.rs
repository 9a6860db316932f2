//! Segment length in real time.
//!
//! Tempo ramps linearly from the previous segment's tempo to this segment's
//! tempo across the segment's beats, so the join between segments has no step.

/// Microseconds per second.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Tempos closer than this are treated as constant.
const TEMPO_EPSILON: f64 = 1e-9;

/// Seconds taken by `beats` while tempo moves linearly from `tempo_from` to
/// `tempo_to` beats per minute.
///
/// Integrates `60 / T(b)` over the beats, where `T` is the ramp. A
/// non-positive `tempo_from` is replaced by `tempo_to`.
pub fn seconds_for_beats(beats: f64, tempo_from: f64, tempo_to: f64) -> f64 {
    if beats <= 0.0 || tempo_to <= 0.0 {
        return 0.0;
    }
    let from = if tempo_from > 0.0 { tempo_from } else { tempo_to };
    if (tempo_to - from).abs() < TEMPO_EPSILON {
        return 60.0 * beats / tempo_to;
    }
    60.0 * beats / (tempo_to - from) * (tempo_to / from).ln()
}

/// Same as [`seconds_for_beats`], rounded to whole microseconds.
pub fn micros_for_beats(beats: f64, tempo_from: f64, tempo_to: f64) -> u64 {
    (seconds_for_beats(beats, tempo_from, tempo_to) * MICROS_PER_SECOND).round() as u64
}
