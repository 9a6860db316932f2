//! Detail craft: up to `detail_program_limit` distinct programs per segment.

use rand::RngCore;

use super::voice::craft_voice_stage;
use crate::error::Result;
use crate::fabricator::{CraftContext, Workbench};
use crate::types::ProgramType;

pub fn craft_detail(ctx: &CraftContext<'_>, bench: &mut Workbench, rng: &mut dyn RngCore) -> Result<()> {
    let limit = ctx.config.detail_program_limit.max(1);
    craft_voice_stage(ctx, bench, rng, ProgramType::Detail, limit)
}
