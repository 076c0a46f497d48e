//! Exact placement (`milp`): a placement model solved by a pluggable
//! backend, seeded with the best heuristic layout.

mod branch_bound;
mod formulation;
#[cfg(feature = "milp")]
mod highs;

use std::cmp::Reverse;

pub use branch_bound::BranchAndBound;
pub use formulation::{Assignment, Formulation, Item, MAX_DOMAIN_SPAN, Spot};
#[cfg(feature = "milp")]
pub use highs::HighsBackend;

use formulation::does_not_fit;

use crate::bottom_left::BottomLeftFill;
use crate::error::Result;
use crate::guillotine::{ScoreStrategy, pack_guillotine};
use crate::shelf::pack_shelves;
use crate::strategy::{Layout, PlacementStrategy, SolveContext};
use crate::types::PieceInstance;

/// Above this many instances the search rarely finishes in practical time.
pub const EXACT_INSTANCE_GUIDANCE: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// The search space was exhausted.
    Optimal,
    /// Stopped early; the assignment is the best found so far.
    Feasible,
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub assignment: Assignment,
    pub status: SolutionStatus,
    pub nodes: u64,
}

/// Whether the solver-crate backend was compiled in (`milp` feature).
pub fn is_milp_available() -> bool {
    cfg!(feature = "milp")
}

/// A solver for `Formulation`. Implementations must honor the context's
/// deadline and cancel flag and return their best assignment when stopped.
pub trait MilpBackend: Send + Sync {
    fn solve(
        &self,
        model: &Formulation,
        incumbent: Option<&Assignment>,
        ctx: &SolveContext,
    ) -> Result<SolveOutcome>;
}

pub struct ExactStrategy {
    guillotine: bool,
    backend: Box<dyn MilpBackend>,
}

impl ExactStrategy {
    /// The HiGHS backend when the `milp` feature is on, except for
    /// guillotine runs, which the branch-and-bound enforces exactly.
    pub fn new(guillotine: bool) -> Self {
        Self::with_backend(guillotine, default_backend(guillotine))
    }

    pub fn with_backend(guillotine: bool, backend: Box<dyn MilpBackend>) -> Self {
        Self {
            guillotine,
            backend,
        }
    }

    /// Best heuristic layout that is feasible for the model: complete on an
    /// unbounded roll, and guillotine-cuttable when cuts are constrained.
    ///
    /// The shelf layout is built without a deadline. It is always complete
    /// on a roll and always guillotine, so an incumbent exists. The other
    /// seeds run only while `ctx` allows.
    fn incumbent(&self, instances: &[PieceInstance], ctx: &SolveContext) -> Layout {
        let stock = ctx.stock;
        let shelf = pack_shelves(instances, &SolveContext::new(stock));
        let mut candidates = vec![shelf];

        // Free-rectangle layouts are guillotine by construction.
        for strategy in ScoreStrategy::ALL {
            if ctx.should_stop() {
                break;
            }
            candidates.push(pack_guillotine(instances, &stock, strategy));
        }
        if !self.guillotine && !ctx.should_stop() {
            candidates.push(BottomLeftFill::simple().pack(instances, ctx));
        }

        let seeds = candidates.len();
        let best = candidates
            .into_iter()
            .filter(|l| stock.is_bounded() || l.unplaced.is_empty())
            .min_by_key(|l| (Reverse(l.placed_area()), l.consumed_length()))
            .unwrap_or_default();
        tracing::debug!(
            seeds,
            area = best.placed_area(),
            length = best.consumed_length(),
            "seeded exact search"
        );
        best
    }
}

#[cfg(feature = "milp")]
fn default_backend(guillotine: bool) -> Box<dyn MilpBackend> {
    if guillotine {
        Box::new(BranchAndBound::default())
    } else {
        Box::new(HighsBackend)
    }
}

#[cfg(not(feature = "milp"))]
fn default_backend(_guillotine: bool) -> Box<dyn MilpBackend> {
    Box::new(BranchAndBound::default())
}

impl PlacementStrategy for ExactStrategy {
    fn name(&self) -> &'static str {
        "milp"
    }

    fn place(&self, instances: &[PieceInstance], ctx: &SolveContext) -> Result<Layout> {
        if instances.is_empty() {
            return Ok(Layout {
                proven_optimal: true,
                ..Layout::default()
            });
        }
        if instances.len() > EXACT_INSTANCE_GUIDANCE {
            tracing::warn!(
                instances = instances.len(),
                "exact search over this many pieces will likely stop at the time limit"
            );
        }

        let stock = ctx.stock;
        if let Some(misfit) = instances
            .iter()
            .find(|i| i.fitting_orientation(&stock).is_none())
        {
            return Err(does_not_fit(misfit, &stock));
        }

        let mut incumbent = self.incumbent(instances, ctx);
        if ctx.should_stop() {
            tracing::debug!("time limit reached while seeding, keeping the best heuristic layout");
            incumbent.placements.sort_by_key(|p| p.instance_id);
            incumbent.unplaced.sort_by_key(|u| u.instance_id);
            incumbent.proven_optimal = false;
            return Ok(incumbent);
        }

        let model = Formulation::build(
            instances,
            &stock,
            Some(incumbent.consumed_length()),
            self.guillotine,
        )?;
        let seed = model.assignment_from(&incumbent);

        let outcome = self.backend.solve(&model, seed.as_ref(), ctx)?;
        let layout = model.to_layout(
            instances,
            &outcome.assignment,
            outcome.status == SolutionStatus::Optimal,
        );
        tracing::debug!(
            nodes = outcome.nodes,
            optimal = layout.proven_optimal,
            placed = layout.placements.len(),
            length = layout.consumed_length(),
            "exact search finished"
        );
        Ok(layout)
    }
}
