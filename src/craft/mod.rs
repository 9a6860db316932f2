//! Craft stages: the choice algorithms of each program type.
//!
//! Every stage runs the same selection:
//! 1. gather candidates bound directly to the chain and through its libraries,
//!    each scope split into a preferred phase and a fallback phase for
//!    programs the stage avoids (direct 1 and 2, library 3 and 4),
//! 2. drop candidates whose memes are inadmissible next to the memes the
//!    segment has accumulated so far,
//! 3. score the rest (Gaussian entropy, meme isometry against the previous
//!    segment's analogous memes and against the memes accumulated so far, key
//!    mode match, repeat penalty),
//! 4. draw one from a [`MarbleBag`] weighted by `max(score, 0) + floor`.
//!
//! Candidates that cannot be scored (bad key text, missing bindings) are
//! recorded as faults on the [`ScoreSheet`] and skipped.

pub mod detail;
pub mod macro_main;
pub mod rhythm;
mod voice;

use rand::RngCore;
use rand_distr::{Distribution, Normal};
use std::fmt;
use tracing::{debug, warn};

use crate::catalog::BindingScope;
use crate::config::StageWeights;
use crate::error::{FabricationError, Result};
use crate::fabricator::{CraftContext, StageOutcome, StageReport};
use crate::marble_bag::MarbleBag;
use crate::meme::{score, MemeStack, MemeTaxonomy};
use crate::music::{delta_text, Mode};
use crate::types::{Program, ProgramType, SequenceBinding};

/// How candidates of one draw are scored.
#[derive(Debug, Clone)]
pub struct Scoring {
    pub weights: StageWeights,
    /// Memes of the previous segment's analogous choice.
    pub previous_target: Vec<String>,
    /// Memes accumulated by this segment's earlier stages.
    pub accumulated_target: Vec<String>,
    /// Reference mode for the mode-match bonus.
    pub mode: Option<Mode>,
    /// Program ids penalised as repeats of the previous segment.
    pub repeats: Vec<String>,
    /// Program ids only drawn from the fallback phase of their scope.
    pub avoid: Vec<String>,
}

impl Scoring {
    /// Scores a candidate whose relevant memes are `memes`.
    pub fn score(&self, program: &Program, memes: &[String], rng: &mut dyn RngCore) -> Result<f64> {
        let key = program.parsed_key()?;
        let mut total = entropy(self.weights.entropy, rng);
        let overlap = score(memes, &self.previous_target) + score(memes, &self.accumulated_target);
        total += self.weights.isometry * overlap as f64;
        if self.mode == Some(key.mode) {
            total += self.weights.mode_match;
        }
        if self.repeats.iter().any(|id| id == &program.id) {
            total -= self.weights.repeat_penalty;
        }
        Ok(total)
    }

    /// Bag phase of a candidate in `scope`.
    pub fn phase(&self, scope: BindingScope, program: &Program) -> u32 {
        let avoided = self.avoid.iter().any(|id| id == &program.id) as u32;
        (scope.phase() - 1) * 2 + 1 + avoided
    }
}

fn entropy(sigma: f64, rng: &mut dyn RngCore) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    match Normal::new(0.0, sigma) {
        Ok(normal) => normal.sample(rng),
        Err(_) => 0.0,
    }
}

/// Result of the admissibility check for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Admissible; these memes are scored against the continuity target.
    Admit(Vec<String>),
    /// Inadmissible, with the reason.
    Exclude(String),
}

/// What happened to one candidate.
#[derive(Debug)]
pub enum CandidateOutcome<'p> {
    Scored {
        program: &'p Program,
        phase: u32,
        score: f64,
    },
    Excluded {
        program: &'p Program,
        reason: String,
    },
    Faulted {
        program: &'p Program,
        error: FabricationError,
    },
}

impl fmt::Display for CandidateOutcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateOutcome::Scored {
                program,
                phase,
                score,
            } => write!(f, "{} scored {:.3} in phase {}", program, score, phase),
            CandidateOutcome::Excluded { program, reason } => {
                write!(f, "{} excluded: {}", program, reason)
            }
            CandidateOutcome::Faulted { program, error } => write!(f, "{} faulted: {}", program, error),
        }
    }
}

/// Per-candidate outcomes of one draw.
#[derive(Debug, Default)]
pub struct ScoreSheet<'p> {
    outcomes: Vec<CandidateOutcome<'p>>,
}

impl<'p> ScoreSheet<'p> {
    /// Checks and scores every candidate.
    pub fn build<F>(
        candidates: &[(BindingScope, &'p Program)],
        scoring: &Scoring,
        rng: &mut dyn RngCore,
        admit: F,
    ) -> Self
    where
        F: Fn(&'p Program) -> Result<Admission>,
    {
        let mut outcomes = Vec::with_capacity(candidates.len());
        for (scope, program) in candidates {
            let program = *program;
            let outcome = match admit(program) {
                Err(error) => CandidateOutcome::Faulted { program, error },
                Ok(Admission::Exclude(reason)) => CandidateOutcome::Excluded { program, reason },
                Ok(Admission::Admit(memes)) => match scoring.score(program, &memes, rng) {
                    Ok(score) => CandidateOutcome::Scored {
                        program,
                        phase: scoring.phase(*scope, program),
                        score,
                    },
                    Err(error) => CandidateOutcome::Faulted { program, error },
                },
            };
            outcomes.push(outcome);
        }
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[CandidateOutcome<'p>] {
        &self.outcomes
    }

    /// Descriptions of every excluded or faulted candidate.
    pub fn skipped(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o, CandidateOutcome::Scored { .. }))
            .map(|o| o.to_string())
            .collect()
    }

    /// Bag of scored candidates, weighted `max(score, 0) + floor`.
    pub fn bag(&self, floor: f64) -> MarbleBag<&'p Program> {
        let mut bag = MarbleBag::new();
        for outcome in &self.outcomes {
            if let CandidateOutcome::Scored {
                program,
                phase,
                score,
            } = outcome
            {
                bag.add(*phase, *program, score.max(0.0) + floor);
            }
        }
        bag
    }
}

/// Programs of a type reachable from the chain, direct bindings first.
pub fn candidates<'p>(
    ctx: &CraftContext<'p>,
    program_type: ProgramType,
) -> Vec<(BindingScope, &'p Program)> {
    BindingScope::all()
        .into_iter()
        .flat_map(|scope| {
            ctx.catalog
                .programs(ctx.chain, program_type, scope)
                .into_iter()
                .map(move |program| (scope, program))
        })
        .collect()
}

/// Scores the candidates of a type and draws one.
///
/// Programs whose ids are in `exclude` are not considered. Fails with
/// SELECTION_EXHAUSTED when nothing drawable is left.
pub fn choose_program<'p, F>(
    ctx: &CraftContext<'p>,
    program_type: ProgramType,
    scoring: &Scoring,
    exclude: &[String],
    rng: &mut dyn RngCore,
    admit: F,
) -> Result<(&'p Program, StageReport)>
where
    F: Fn(&'p Program) -> Result<Admission>,
{
    let pool: Vec<(BindingScope, &'p Program)> = candidates(ctx, program_type)
        .into_iter()
        .filter(|(_, p)| !exclude.contains(&p.id))
        .collect();
    let sheet = ScoreSheet::build(&pool, scoring, rng, admit);
    let bag = sheet.bag(ctx.config.weight_floor);

    let mut report = StageReport::new(program_type, StageOutcome::Fresh);
    report.bag = bag.report();
    report.skipped = sheet.skipped();
    debug!(
        segment_id = %ctx.segment.id,
        program_type = %program_type,
        bag = %report.bag,
        skipped = report.skipped.len(),
        "Scored candidates"
    );

    match bag.pick(rng) {
        Some(program) => Ok((*program, report)),
        None => {
            for skipped in &report.skipped {
                warn!(segment_id = %ctx.segment.id, "{}", skipped);
            }
            Err(FabricationError::no_candidate(program_type))
        }
    }
}

/// Admissible when the program's memes may join `current`.
pub fn admit_program(taxonomy: &MemeTaxonomy, program: &Program, current: &[String]) -> Admission {
    if MemeStack::from(taxonomy, current).is_allowed(&program.memes) {
        Admission::Admit(program.memes.clone())
    } else {
        Admission::Exclude(format!("memes {:?} conflict with {:?}", program.memes, current))
    }
}

/// Like [`admit_program`], also requiring an admissible binding at `offset`.
///
/// A program with no binding at all at the offset is a fault. The admitted
/// memes are the program's plus those of its admissible bindings there.
pub fn admit_with_binding(
    taxonomy: &MemeTaxonomy,
    program: &Program,
    offset: u32,
    current: &[String],
) -> Result<Admission> {
    if program.bindings_at(offset).is_empty() {
        return Err(FabricationError::not_found(
            "ProgramSequenceBinding",
            &format!("{}@{}", program.id, offset),
        ));
    }
    let mut memes = match admit_program(taxonomy, program, current) {
        Admission::Admit(memes) => memes,
        excluded => return Ok(excluded),
    };
    let bindings = admissible_bindings(taxonomy, program, offset, current);
    if bindings.is_empty() {
        return Ok(Admission::Exclude(format!(
            "no admissible binding at offset {}",
            offset
        )));
    }
    for binding in bindings {
        memes.extend(binding.memes.iter().cloned());
    }
    Ok(Admission::Admit(memes))
}

/// Bindings of `program` at `offset` whose memes may join `current` and the
/// program's own memes.
pub fn admissible_bindings<'p>(
    taxonomy: &MemeTaxonomy,
    program: &'p Program,
    offset: u32,
    current: &[String],
) -> Vec<&'p SequenceBinding> {
    let mut stack = MemeStack::from(taxonomy, current);
    stack.extend(&program.memes);
    program
        .bindings_at(offset)
        .into_iter()
        .filter(|b| stack.is_allowed(&b.memes))
        .collect()
}

/// Draws a binding of `program` at `offset`.
///
/// `avoid` (the previous segment's binding) goes into the fallback phase, so
/// it is only drawn when it is the sole admissible binding.
pub fn choose_binding<'p>(
    taxonomy: &MemeTaxonomy,
    program: &'p Program,
    offset: u32,
    avoid: Option<&str>,
    current: &[String],
    rng: &mut dyn RngCore,
) -> Option<&'p SequenceBinding> {
    let mut bag = MarbleBag::new();
    for binding in admissible_bindings(taxonomy, program, offset, current) {
        let phase = if avoid == Some(binding.id.as_str()) { 2 } else { 1 };
        bag.add(phase, binding, 1.0);
    }
    bag.pick(rng).copied()
}

/// Semitones moving `program`'s key onto `target`, relative to `accumulated`.
///
/// Zero when the program does not transpose. Unparseable keys are logged
/// and give zero.
pub fn transpose_to(program: &Program, target: &str, accumulated: i32) -> i32 {
    if !program.config.do_transpose {
        return 0;
    }
    match delta_text(&program.key, target, accumulated) {
        Ok(semitones) => semitones,
        Err(e) => {
            warn!(program_id = %program.id, target, error = %e, "Cannot compute transpose, using 0");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FabricatorConfig;
    use crate::error::ErrorCode;
    use crate::fabricator::CraftContext;
    use crate::retrospective::Retrospective;
    use crate::testing::{catalog, library_chain, program, program_with_bindings, taxonomy};
    use crate::types::{ChainBinding, Segment};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn strings(memes: &[&str]) -> Vec<String> {
        memes.iter().map(|m| m.to_string()).collect()
    }

    fn scoring(target: &[&str], mode: Option<Mode>, repeats: &[&str]) -> Scoring {
        Scoring {
            weights: StageWeights {
                entropy: 0.0,
                isometry: 10.0,
                mode_match: 2.0,
                repeat_penalty: 5.0,
            },
            previous_target: Vec::new(),
            accumulated_target: strings(target),
            mode,
            repeats: strings(repeats),
            avoid: Vec::new(),
        }
    }

    #[test]
    fn score_adds_isometry_mode_and_repeat_terms() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let p = program("p", ProgramType::Main, "A minor", &["WINTER"]);
        let memes = vec!["WINTER".to_string(), "DARK".to_string()];

        let s = scoring(&["winter", "dark"], Some(Mode::Minor), &[]);
        assert_eq!(s.score(&p, &memes, &mut rng).unwrap(), 22.0);

        let s = scoring(&["WINTER"], Some(Mode::Major), &["p"]);
        assert_eq!(s.score(&p, &memes, &mut rng).unwrap(), 5.0);
    }

    #[test]
    fn previous_and_accumulated_overlap_both_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let p = program("p", ProgramType::Rhythm, "C", &[]);
        let memes = strings(&["COLD", "DARK"]);

        let mut s = scoring(&["DARK"], None, &[]);
        assert_eq!(s.score(&p, &memes, &mut rng).unwrap(), 10.0);
        s.previous_target = strings(&["cold"]);
        assert_eq!(s.score(&p, &memes, &mut rng).unwrap(), 20.0);
        s.accumulated_target.clear();
        assert_eq!(s.score(&p, &memes, &mut rng).unwrap(), 10.0);
    }

    #[test]
    fn previous_segment_overlap_decides_draw() {
        let cold = program("cold", ProgramType::Rhythm, "C", &["COLD"]);
        let warm = program("warm", ProgramType::Rhythm, "C", &["WARM"]);
        let store = catalog(vec![warm, cold]);
        let chain = library_chain();
        let seg = Segment::planned(&chain.id, 0, 0);
        let config = FabricatorConfig {
            weight_floor: 1e-9,
            ..FabricatorConfig::default()
        };
        let ctx = CraftContext::new(&store, &chain, &seg, &config, Retrospective::empty()).unwrap();

        let mut s = scoring(&[], None, &[]);
        s.previous_target = strings(&["COLD"]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..20 {
            let (picked, _) = choose_program(&ctx, ProgramType::Rhythm, &s, &[], &mut rng, |p| {
                Ok(Admission::Admit(p.memes.clone()))
            })
            .unwrap();
            assert_eq!(picked.id, "cold");
        }
    }

    #[test]
    fn avoided_program_only_as_fallback() {
        let s = Scoring {
            avoid: strings(&["prev"]),
            ..scoring(&[], None, &[])
        };
        let prev = program("prev", ProgramType::Macro, "C", &[]);
        let other = program("other", ProgramType::Macro, "C", &[]);
        assert_eq!(s.phase(BindingScope::Direct, &other), 1);
        assert_eq!(s.phase(BindingScope::Direct, &prev), 2);
        assert_eq!(s.phase(BindingScope::Library, &other), 3);
        assert_eq!(s.phase(BindingScope::Library, &prev), 4);

        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let pool = vec![(BindingScope::Library, &prev), (BindingScope::Library, &other)];
        let sheet = ScoreSheet::build(&pool, &s, &mut rng, |p| Ok(Admission::Admit(p.memes.clone())));
        let bag = sheet.bag(0.01);
        for _ in 0..20 {
            assert_eq!(bag.pick(&mut rng).unwrap().id, "other");
        }
        let alone = vec![(BindingScope::Library, &prev)];
        let sheet = ScoreSheet::build(&alone, &s, &mut rng, |p| Ok(Admission::Admit(p.memes.clone())));
        assert_eq!(sheet.bag(0.01).pick(&mut rng).unwrap().id, "prev");
    }

    #[test]
    fn malformed_key_is_a_fault() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let p = program("p", ProgramType::Main, "H lydian", &[]);
        let err = scoring(&[], None, &[]).score(&p, &[], &mut rng).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidMusic);
    }

    #[test]
    fn sheet_separates_scored_excluded_and_faulted() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let good = program("good", ProgramType::Rhythm, "C", &["WINTER"]);
        let clash = program("clash", ProgramType::Rhythm, "C", &["SUMMER"]);
        let broken = program("broken", ProgramType::Rhythm, "??", &[]);
        let tax = taxonomy();
        let current = vec!["WINTER".to_string()];
        let pool = vec![
            (BindingScope::Direct, &good),
            (BindingScope::Library, &clash),
            (BindingScope::Library, &broken),
        ];
        let sheet = ScoreSheet::build(&pool, &scoring(&[], None, &[]), &mut rng, |p| {
            Ok(admit_program(&tax, p, &current))
        });

        assert!(matches!(sheet.outcomes()[0], CandidateOutcome::Scored { phase: 1, .. }));
        assert!(matches!(sheet.outcomes()[1], CandidateOutcome::Excluded { .. }));
        assert!(matches!(sheet.outcomes()[2], CandidateOutcome::Faulted { .. }));
        assert_eq!(sheet.skipped().len(), 2);
        assert_eq!(sheet.bag(0.01).len(), 1);
    }

    #[test]
    fn negative_scores_stay_drawable() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let p = program("p", ProgramType::Main, "C", &[]);
        let pool = vec![(BindingScope::Library, &p)];
        let sheet = ScoreSheet::build(&pool, &scoring(&[], None, &["p"]), &mut rng, |p| {
            Ok(Admission::Admit(p.memes.clone()))
        });
        let bag = sheet.bag(0.01);
        assert!((bag.phase_weight(3) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn direct_bindings_win_over_library() {
        let direct = program("direct", ProgramType::Rhythm, "C", &[]);
        let library = program("library", ProgramType::Rhythm, "C", &[]);
        let store = catalog(vec![library, direct]);
        let mut chain = library_chain();
        chain.bindings.push(ChainBinding::program("direct"));
        let seg = Segment::planned(&chain.id, 0, 0);
        let config = FabricatorConfig::default();
        let ctx = CraftContext::new(&store, &chain, &seg, &config, Retrospective::empty()).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            let (picked, report) = choose_program(
                &ctx,
                ProgramType::Rhythm,
                &scoring(&[], None, &[]),
                &[],
                &mut rng,
                |p| Ok(Admission::Admit(p.memes.clone())),
            )
            .unwrap();
            assert_eq!(picked.id, "direct");
            assert!(report.bag.contains("phase 3"));
        }

        let err = choose_program(
            &ctx,
            ProgramType::Rhythm,
            &scoring(&[], None, &[]),
            &["direct".to_string(), "library".to_string()],
            &mut rng,
            |p| Ok(Admission::Admit(p.memes.clone())),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SelectionExhausted);
    }

    #[test]
    fn binding_admission() {
        let tax = taxonomy();
        let p = program_with_bindings(
            "m",
            ProgramType::Main,
            "C",
            &[],
            &[(0, &["SUMMER"]), (0, &["WINTER"]), (1, &[])],
        );
        let winter = vec!["WINTER".to_string()];
        let admitted = admissible_bindings(&tax, &p, 0, &winter);
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].id, "m-b1");

        assert_eq!(
            admit_with_binding(&tax, &p, 0, &winter).unwrap(),
            Admission::Admit(vec!["WINTER".to_string()])
        );
        assert_eq!(
            admit_with_binding(&tax, &p, 7, &winter).unwrap_err().code,
            ErrorCode::EntityNotFound
        );
        let dark_summer = program_with_bindings("d", ProgramType::Main, "C", &[], &[(0, &["SUMMER"])]);
        assert!(matches!(
            admit_with_binding(&tax, &dark_summer, 0, &winter).unwrap(),
            Admission::Exclude(_)
        ));
    }

    #[test]
    fn avoided_binding_only_as_fallback() {
        let tax = taxonomy();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let two = program_with_bindings("m", ProgramType::Macro, "C", &[], &[(0, &[]), (0, &[])]);
        for _ in 0..20 {
            let b = choose_binding(&tax, &two, 0, Some("m-b0"), &[], &mut rng).unwrap();
            assert_eq!(b.id, "m-b1");
        }
        let one = program_with_bindings("n", ProgramType::Macro, "C", &[], &[(0, &[])]);
        assert_eq!(
            choose_binding(&tax, &one, 0, Some("n-b0"), &[], &mut rng).unwrap().id,
            "n-b0"
        );
        assert!(choose_binding(&tax, &one, 3, None, &[], &mut rng).is_none());
    }

    #[test]
    fn transpose_respects_program_config() {
        let mut p = program("p", ProgramType::Main, "D", &[]);
        assert_eq!(transpose_to(&p, "C", 0), -2);
        assert_eq!(transpose_to(&p, "C", 3), 1);
        assert_eq!(transpose_to(&p, "not a key", 0), 0);
        p.config.do_transpose = false;
        assert_eq!(transpose_to(&p, "C", 0), 0);
    }
}
