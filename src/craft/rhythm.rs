//! Rhythm and Beat craft: at most one program each, one choice per voice.

use rand::RngCore;

use super::voice::craft_voice_stage;
use crate::error::Result;
use crate::fabricator::{CraftContext, Workbench};
use crate::types::ProgramType;

pub fn craft_rhythm(ctx: &CraftContext<'_>, bench: &mut Workbench, rng: &mut dyn RngCore) -> Result<()> {
    craft_voice_stage(ctx, bench, rng, ProgramType::Rhythm, 1)
}

pub fn craft_beat(ctx: &CraftContext<'_>, bench: &mut Workbench, rng: &mut dyn RngCore) -> Result<()> {
    craft_voice_stage(ctx, bench, rng, ProgramType::Beat, 1)
}
