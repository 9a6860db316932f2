//! Chain work: planning the next segment and crafting it under the state guard.
//!
//! A segment moves Planned -> Crafting -> Dubbing here. If fabrication fails
//! the segment is reverted to Planned with nothing persisted, so the next
//! attempt starts clean.

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::FabricatorConfig;
use crate::error::{FabricationError, Result};
use crate::fabricator::{fabricate, segment_rng, FabricatedSegment};
use crate::store::{SegmentReader, SegmentWriter};
use crate::types::{Chain, Segment};

/// Plans the chain's next segment.
///
/// Returns None while the last segment is not yet crafted, or once the next
/// segment would begin at or after the chain's stop time.
pub fn plan_next_segment<S>(store: &mut S, chain: &Chain) -> Result<Option<Segment>>
where
    S: SegmentReader + SegmentWriter,
{
    if !chain.state.is_fabricating() {
        return Err(FabricationError::state_conflict(format!(
            "Chain[{}] is {:?}, not fabricating",
            chain.id, chain.state
        )));
    }

    let (offset, begin_at_micros) = match store.last_segment(&chain.id) {
        None => (0, chain.start_at_micros),
        Some(last) if !last.state.is_crafted() => {
            debug!(segment_id = %last.id, state = %last.state, "Last segment not crafted, nothing to plan");
            return Ok(None);
        }
        Some(last) => {
            let end = last.end_at_micros.ok_or_else(|| {
                FabricationError::continuity(format!("Crafted Segment[{}] has no end time", last.id))
            })?;
            (last.offset + 1, end)
        }
    };

    if let Some(stop) = chain.stop_at_micros {
        if begin_at_micros >= stop {
            debug!(chain_id = %chain.id, begin_at_micros, stop, "Chain window exhausted");
            return Ok(None);
        }
    }

    let segment = Segment::planned(&chain.id, offset, begin_at_micros);
    store.plan(segment.clone())?;
    info!(segment_id = %segment.id, offset, begin_at_micros, "Planned segment");
    Ok(Some(segment))
}

/// Crafts a Planned segment and commits the result.
///
/// On failure the segment is reverted to Planned and the fabrication error
/// is returned.
pub fn craft_segment<S>(
    store: &mut S,
    catalog: &dyn Catalog,
    chain: &Chain,
    segment_id: &str,
    config: &FabricatorConfig,
) -> Result<FabricatedSegment>
where
    S: SegmentReader + SegmentWriter,
{
    let segment = store.begin_crafting(segment_id)?;
    let mut rng = segment_rng(config.seed, &chain.id, segment.offset);

    let result = fabricate(catalog, &*store, chain, &segment, config, &mut rng).and_then(|done| {
        store.commit(&done.segment, &done.choices, &done.memes, &done.chords)?;
        Ok(done)
    });

    match result {
        Ok(done) => Ok(done),
        Err(e) => {
            warn!(segment_id, code = %e.code, error = %e.message, "Fabrication failed, reverting segment");
            if let Err(revert) = store.revert(segment_id) {
                warn!(segment_id, error = %revert, "Failed to revert segment");
            }
            Err(e)
        }
    }
}

/// Plans and crafts up to `count` segments, stopping early at the chain's end.
pub fn extend_chain<S>(
    store: &mut S,
    catalog: &dyn Catalog,
    chain: &Chain,
    config: &FabricatorConfig,
    count: usize,
) -> Result<Vec<FabricatedSegment>>
where
    S: SegmentReader + SegmentWriter,
{
    let mut crafted = Vec::with_capacity(count);
    while crafted.len() < count {
        let Some(segment) = plan_next_segment(store, chain)? else {
            break;
        };
        crafted.push(craft_segment(store, catalog, chain, &segment.id, config)?);
    }
    Ok(crafted)
}
