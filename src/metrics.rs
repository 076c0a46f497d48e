//! Layout measurements shared by every strategy.

use std::time::Duration;

use serde::Serialize;

use crate::request::Problem;
use crate::result::OptimizationResult;
use crate::strategy::{Algorithm, Layout};
use crate::types::{PieceType, Placement, StockSheet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyMetrics {
    /// Used area as a percentage of total area.
    pub area_efficiency: f64,
    /// Placed pieces per 10 000 units of total area.
    pub piece_density: f64,
    pub avg_piece_area: f64,
    /// Population standard deviation of placed areas over their mean.
    pub cv_area: f64,
    pub waste_percentage: f64,
    pub execution_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieceSummary {
    pub piece_id: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub area: u64,
    pub requested: u32,
    pub placed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemStatistics {
    pub stock_width: u32,
    pub stock_height: Option<u32>,
    pub stock_area: Option<u64>,
    pub total_pieces: u64,
    pub total_piece_area: u64,
    /// Waste if every piece were placed on the bounded sheet.
    pub theoretical_waste: Option<f64>,
    pub allow_rotation: bool,
    pub guillotine_cut: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OversizedPiece {
    pub index: usize,
    pub piece_id: String,
    pub width: u32,
    pub height: u32,
    pub quantity: u32,
}

/// Pre-run check of the cut list against the sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub fits_in_area: bool,
    pub total_piece_area: u64,
    pub stock_area: Option<u64>,
    pub area_ratio: f64,
    /// Pieces exceeding the sheet in every allowed orientation.
    pub oversized_pieces: Vec<OversizedPiece>,
    pub has_oversized_pieces: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialCost {
    pub total_cost: f64,
    pub used_cost: f64,
    pub waste_cost: f64,
    pub cost_efficiency: f64,
    pub cost_per_area: f64,
}

/// Stock area a layout is charged for: the whole sheet when bounded, the
/// width times the consumed length on a roll.
pub fn total_area(stock: &StockSheet, consumed_length: u32) -> u64 {
    stock
        .area()
        .unwrap_or(stock.width as u64 * consumed_length as u64)
}

pub fn waste_percentage(used_area: u64, total_area: u64) -> f64 {
    if total_area == 0 {
        return 0.0;
    }
    (100.0 * (1.0 - used_area as f64 / total_area as f64)).clamp(0.0, 100.0)
}

pub fn efficiency(
    placements: &[Placement],
    used_area: u64,
    total_area: u64,
    execution_time: f64,
) -> EfficiencyMetrics {
    let count = placements.len() as f64;
    let (area_efficiency, piece_density) = if total_area == 0 {
        (0.0, 0.0)
    } else {
        let total = total_area as f64;
        (used_area as f64 / total * 100.0, count / (total / 10_000.0))
    };

    let (avg_piece_area, cv_area) = if placements.is_empty() {
        (0.0, 0.0)
    } else {
        let mean = used_area as f64 / count;
        let variance = placements
            .iter()
            .map(|p| (p.area as f64 - mean).powi(2))
            .sum::<f64>()
            / count;
        (mean, variance.sqrt() / mean)
    };

    EfficiencyMetrics {
        area_efficiency,
        piece_density,
        avg_piece_area,
        cv_area,
        waste_percentage: waste_percentage(used_area, total_area),
        execution_time,
    }
}

pub fn piece_summary(pieces: &[PieceType], placements: &[Placement]) -> Vec<PieceSummary> {
    // Instance ids run through the types in order, `quantity` at a time.
    let mut first_id = 0usize;
    pieces
        .iter()
        .map(|piece| {
            let ids = first_id..first_id + piece.quantity as usize;
            first_id = ids.end;
            let placed = placements
                .iter()
                .filter(|p| ids.contains(&p.instance_id))
                .count() as u32;
            PieceSummary {
                piece_id: piece.id.clone(),
                description: piece.description.clone(),
                width: piece.width,
                height: piece.height,
                area: piece.rect().area(),
                requested: piece.quantity,
                placed,
            }
        })
        .collect()
}

pub fn statistics(problem: &Problem) -> ProblemStatistics {
    let total_piece_area = requested_area(&problem.pieces);
    let stock_area = problem.stock.area();
    ProblemStatistics {
        stock_width: problem.stock.width,
        stock_height: problem.stock.height,
        stock_area,
        total_pieces: problem.pieces.iter().map(|p| p.quantity as u64).sum(),
        total_piece_area,
        theoretical_waste: stock_area
            .filter(|a| *a > 0)
            .map(|a| (a as f64 - total_piece_area as f64) / a as f64 * 100.0),
        allow_rotation: problem.pieces.iter().any(|p| p.allow_rotation),
        guillotine_cut: problem.guillotine,
    }
}

pub fn fit_report(pieces: &[PieceType], stock: &StockSheet) -> FitReport {
    let total_piece_area = requested_area(pieces);
    let stock_area = stock.area();
    let oversized_pieces: Vec<OversizedPiece> = pieces
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let upright = p.rect();
            !stock.admits(upright) && !(p.allow_rotation && stock.admits(upright.rotated()))
        })
        .map(|(index, p)| OversizedPiece {
            index,
            piece_id: p.id.clone(),
            width: p.width,
            height: p.height,
            quantity: p.quantity,
        })
        .collect();

    FitReport {
        fits_in_area: stock_area.is_none_or(|a| total_piece_area <= a),
        total_piece_area,
        stock_area,
        area_ratio: match stock_area {
            Some(a) if a > 0 => total_piece_area as f64 / a as f64,
            _ => 0.0,
        },
        has_oversized_pieces: !oversized_pieces.is_empty(),
        oversized_pieces,
    }
}

pub fn material_cost(used_area: u64, total_area: u64, cost_per_area: f64) -> MaterialCost {
    let total_cost = total_area as f64 * cost_per_area;
    let used_cost = used_area as f64 * cost_per_area;
    MaterialCost {
        total_cost,
        used_cost,
        waste_cost: total_cost - used_cost,
        cost_efficiency: if total_cost > 0.0 {
            used_cost / total_cost * 100.0
        } else {
            0.0
        },
        cost_per_area,
    }
}

fn requested_area(pieces: &[PieceType]) -> u64 {
    pieces
        .iter()
        .map(|p| p.rect().area() * p.quantity as u64)
        .sum()
}

/// Turn a strategy's layout into the result every caller sees.
pub fn aggregate(
    algorithm: Algorithm,
    layout: Layout,
    problem: &Problem,
    elapsed: Duration,
) -> OptimizationResult {
    let used_area = layout.placed_area();
    let consumed_length = layout.consumed_length();
    let total_area = total_area(&problem.stock, consumed_length);
    let execution_time = elapsed.as_secs_f64();

    OptimizationResult {
        algorithm,
        sheets_used: 1,
        stock_width: problem.stock.width,
        stock_height: problem.stock.height,
        consumed_length,
        waste_percentage: waste_percentage(used_area, total_area),
        execution_time,
        is_optimal: algorithm.is_exact() && layout.proven_optimal,
        total_area,
        used_area,
        efficiency_metrics: efficiency(&layout.placements, used_area, total_area, execution_time),
        piece_summary: piece_summary(&problem.pieces, &layout.placements),
        statistics: statistics(problem),
        validation: fit_report(&problem.pieces, &problem.stock),
        placements: layout.placements,
        unplaced: layout.unplaced,
    }
}
