//! Name-selected placement strategies behind one trait.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::bottom_left::BottomLeftFill;
use crate::error::{OptimizeError, Result};
use crate::exact::ExactStrategy;
use crate::shelf::ShelfPacker;
use crate::types::{PieceInstance, Placement, StockSheet, UnplacedPiece};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Milp,
    Simple,
    Fast,
    Improved,
    Smart,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Milp,
        Algorithm::Simple,
        Algorithm::Fast,
        Algorithm::Improved,
        Algorithm::Smart,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Milp => "milp",
            Algorithm::Simple => "simple",
            Algorithm::Fast => "fast",
            Algorithm::Improved => "improved",
            Algorithm::Smart => "smart",
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Algorithm::Milp)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Algorithm::Milp => "exact search over the placement model, proves optimality for small cut lists",
            Algorithm::Simple => "bottom-left fill, largest area first",
            Algorithm::Fast => "shelf packing, tallest first",
            Algorithm::Improved => "bottom-left fill, longest side first",
            Algorithm::Smart => "bottom-left fill choosing the snuggest orientation",
        }
    }
}

impl FromStr for Algorithm {
    type Err = OptimizeError;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| OptimizeError::UnknownAlgorithm(s.to_string()))
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-run inputs every strategy sees: the sheet, the wall-clock deadline
/// and a cancellation flag the caller may raise at any time.
#[derive(Debug, Clone)]
pub struct SolveContext {
    pub stock: StockSheet,
    pub deadline: Option<Instant>,
    pub cancelled: Arc<AtomicBool>,
}

impl SolveContext {
    pub fn new(stock: StockSheet) -> Self {
        Self {
            stock,
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// What a strategy hands back before metrics are computed. Every instance
/// it was given appears exactly once in `placements` or `unplaced`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub placements: Vec<Placement>,
    pub unplaced: Vec<UnplacedPiece>,
    pub proven_optimal: bool,
}

impl Layout {
    pub fn placed_area(&self) -> u64 {
        self.placements.iter().map(|p| p.area).sum()
    }

    pub fn consumed_length(&self) -> u32 {
        self.placements
            .iter()
            .map(|p| p.y + p.height)
            .max()
            .unwrap_or(0)
    }
}

pub trait PlacementStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn place(&self, instances: &[PieceInstance], ctx: &SolveContext) -> Result<Layout>;
}

/// Map an algorithm to its implementation. `guillotine` only affects `milp`.
pub fn select(algorithm: Algorithm, guillotine: bool) -> Box<dyn PlacementStrategy> {
    match algorithm {
        Algorithm::Milp => Box::new(ExactStrategy::new(guillotine)),
        Algorithm::Fast => Box::new(ShelfPacker),
        Algorithm::Simple => Box::new(BottomLeftFill::simple()),
        Algorithm::Improved => Box::new(BottomLeftFill::improved()),
        Algorithm::Smart => Box::new(BottomLeftFill::smart()),
    }
}
