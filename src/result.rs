use serde::Serialize;

use crate::metrics::{self, EfficiencyMetrics, FitReport, MaterialCost, PieceSummary, ProblemStatistics};
use crate::strategy::Algorithm;
use crate::types::{Placement, UnplacedPiece};

/// Outcome of one optimization run. Built once by the metrics aggregator
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub algorithm: Algorithm,
    pub placements: Vec<Placement>,
    pub unplaced: Vec<UnplacedPiece>,
    /// Always 1: a run cuts from a single sheet or roll.
    pub sheets_used: u32,
    pub stock_width: u32,
    /// `None` for an unbounded roll.
    pub stock_height: Option<u32>,
    pub consumed_length: u32,
    pub waste_percentage: f64,
    /// Seconds.
    pub execution_time: f64,
    pub is_optimal: bool,
    pub total_area: u64,
    pub used_area: u64,
    pub efficiency_metrics: EfficiencyMetrics,
    pub piece_summary: Vec<PieceSummary>,
    pub statistics: ProblemStatistics,
    pub validation: FitReport,
}

impl OptimizationResult {
    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    pub fn all_placed(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn material_cost(&self, cost_per_area: f64) -> MaterialCost {
        metrics::material_cost(self.used_area, self.total_area, cost_per_area)
    }
}
