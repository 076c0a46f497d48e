use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use crate::error::{OptimizeError, Result};
use crate::expand::expand;
use crate::metrics::aggregate;
use crate::request::{OptimizeRequest, OptimizeResponse, Problem};
use crate::result::OptimizationResult;
use crate::strategy::{Algorithm, SolveContext, select};

pub struct Solver {
    problem: Problem,
    cancelled: Arc<AtomicBool>,
}

impl Solver {
    pub fn new(problem: Problem) -> Self {
        Self {
            problem,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_request(request: &OptimizeRequest) -> Result<Self> {
        Ok(Self::new(request.validate()?))
    }

    /// Share a flag the caller can raise to stop the run early. The run
    /// still returns its best layout.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn solve(&self) -> Result<OptimizationResult> {
        self.run(self.problem.algorithm)
    }

    /// Like `solve`, but a backend failure is retried once with `fallback`.
    /// Input and feasibility errors are returned as is.
    pub fn solve_with_fallback(&self, fallback: Algorithm) -> Result<OptimizationResult> {
        match self.solve() {
            Err(OptimizeError::SolverError(msg)) if fallback != self.problem.algorithm => {
                tracing::warn!(
                    algorithm = %self.problem.algorithm,
                    %fallback,
                    error = %msg,
                    "solver failed, retrying with fallback"
                );
                self.run(fallback)
            }
            other => other,
        }
    }

    fn run(&self, algorithm: Algorithm) -> Result<OptimizationResult> {
        let started = Instant::now();
        let instances = expand(&self.problem.pieces)?;

        let ctx = SolveContext::new(self.problem.stock)
            .with_deadline(started.checked_add(self.problem.time_limit))
            .with_cancel_flag(Arc::clone(&self.cancelled));
        let strategy = select(algorithm, self.problem.guillotine);
        let layout = strategy.place(&instances, &ctx)?;
        let result = aggregate(algorithm, layout, &self.problem, started.elapsed());

        tracing::info!(
            name = %self.problem.name,
            %algorithm,
            stock = %self.problem.stock,
            instances = instances.len(),
            placed = result.placed_count(),
            waste = result.waste_percentage,
            optimal = result.is_optimal,
            seconds = result.execution_time,
            "optimization finished"
        );
        Ok(result)
    }
}

/// Validate and solve a request, wrapping the outcome in the response envelope.
pub fn optimize(request: &OptimizeRequest) -> OptimizeResponse {
    match Solver::from_request(request).and_then(|s| s.solve()) {
        Ok(result) => OptimizeResponse::ok(result),
        Err(err) => {
            tracing::info!(algorithm = %request.algorithm, error = %err, "optimization rejected");
            OptimizeResponse::failed(request.algorithm.clone(), &err)
        }
    }
}

/// `optimize` for a raw JSON body. Malformed JSON is InvalidInput.
pub fn optimize_json(body: &str) -> OptimizeResponse {
    match serde_json::from_str::<OptimizeRequest>(body) {
        Ok(request) => optimize(&request),
        Err(e) => {
            let err = OptimizeError::invalid(format!("malformed request: {e}"));
            let algorithm = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("algorithm")?.as_str().map(str::to_string))
                .unwrap_or_default();
            OptimizeResponse::failed(algorithm, &err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::request::PieceSpec;
    use crate::types::{StockSheet, UnplacedReason};
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;

    /// Validates a complete result:
    /// 1. Every placement lies within the stock
    /// 2. No two placements overlap
    /// 3. Every instance is either placed or reported unplaced, once
    fn assert_result_valid(res: &OptimizationResult, expected_instances: usize) {
        let stock = StockSheet {
            width: res.stock_width,
            height: res.stock_height,
        };
        for (i, p) in res.placements.iter().enumerate() {
            assert!(
                p.bounds().within(&stock),
                "piece {i} ({}x{} @ ({},{})) leaves the {stock} stock",
                p.width, p.height, p.x, p.y
            );
        }
        for i in 0..res.placements.len() {
            for j in (i + 1)..res.placements.len() {
                let (a, b) = (&res.placements[i], &res.placements[j]);
                assert!(
                    !a.bounds().overlaps(&b.bounds()),
                    "piece {i} @ ({},{}) overlaps piece {j} @ ({},{})",
                    a.x, a.y, b.x, b.y
                );
            }
        }

        let ids: HashSet<usize> = res
            .placements
            .iter()
            .map(|p| p.instance_id)
            .chain(res.unplaced.iter().map(|u| u.instance_id))
            .collect();
        assert_eq!(res.placements.len() + res.unplaced.len(), expected_instances);
        assert_eq!(ids.len(), expected_instances);
        assert!(res.used_area <= res.total_area);
    }

    fn request(width: u32, height: u32, pieces: &[(u32, u32, u32)]) -> OptimizeRequest {
        OptimizeRequest::new(
            width,
            height,
            pieces.iter().map(|&(w, h, q)| PieceSpec::plain(w, h, q)).collect(),
        )
    }

    #[test]
    fn test_every_algorithm_on_mixed_sheet() {
        for algorithm in Algorithm::ALL {
            let mut req = request(1000, 800, &[(200, 300, 2), (150, 200, 3), (100, 100, 5)])
                .with_algorithm(algorithm.name());
            req.time_limit = 2.0;
            let res = Solver::from_request(&req).unwrap().solve().unwrap();
            assert_result_valid(&res, 10);
            assert_eq!(res.algorithm, algorithm);
            assert_eq!(res.sheets_used, 1);
            assert!(res.all_placed(), "{algorithm} left pieces out");
            assert_eq!(res.used_area, 260_000);
            assert!(!res.is_optimal || algorithm.is_exact());
        }
    }

    #[test]
    fn test_single_piece_on_roll() {
        let res = Solver::from_request(&request(1200, 0, &[(600, 400, 1)]))
            .unwrap()
            .solve()
            .unwrap();
        assert_result_valid(&res, 1);
        assert_eq!(res.consumed_length, 400);
        assert_eq!(res.total_area, 480_000);
        assert_eq!(res.stock_height, None);
    }

    #[test]
    fn test_full_sheet_has_no_waste() {
        let res = Solver::from_request(&request(100, 100, &[(100, 100, 1)]))
            .unwrap()
            .solve()
            .unwrap();
        assert_result_valid(&res, 1);
        assert!(res.waste_percentage.abs() < 0.01);
    }

    #[test]
    fn test_overfull_sheet_reports_unplaced() {
        let mut req = request(100, 100, &[(60, 60, 4)]);
        req.allow_rotation = false;
        let res = Solver::from_request(&req).unwrap().solve().unwrap();
        assert_result_valid(&res, 4);
        assert_eq!(res.placements.len(), 1);
        assert!(res.unplaced.iter().all(|u| u.reason == UnplacedReason::NoSpace));
        assert_eq!(res.piece_summary[0].placed, 1);
    }

    #[test]
    fn test_rotation_helps() {
        let res = Solver::from_request(&request(100, 50, &[(50, 100, 1)]).with_algorithm("simple"))
            .unwrap()
            .solve()
            .unwrap();
        assert_result_valid(&res, 1);
        assert!(res.placements[0].rotated);
    }

    #[test]
    fn test_exact_oversized_piece_is_infeasible() {
        let req = request(100, 100, &[(150, 150, 1)]).with_algorithm("milp");
        let err = Solver::from_request(&req).unwrap().solve().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InfeasibleProblem);

        // Heuristics report it instead.
        let res = Solver::from_request(&request(100, 100, &[(150, 150, 1)]))
            .unwrap()
            .solve()
            .unwrap();
        assert_eq!(res.unplaced[0].reason, UnplacedReason::DoesNotFit);
        assert!(res.validation.has_oversized_pieces);
    }

    #[test]
    fn test_fallback_on_solver_error() {
        let mut req = request(2_000_000, 10, &[(1_999_999, 3, 1), (1, 1, 1)]).with_algorithm("milp");
        req.allow_rotation = false;
        let solver = Solver::from_request(&req).unwrap();
        assert_eq!(solver.solve().unwrap_err().kind(), ErrorKind::SolverError);

        let res = solver.solve_with_fallback(Algorithm::Fast).unwrap();
        assert_eq!(res.algorithm, Algorithm::Fast);
        assert_result_valid(&res, 2);
    }

    #[test]
    fn test_fallback_keeps_infeasible() {
        let req = request(100, 100, &[(150, 150, 1)]).with_algorithm("milp");
        let err = Solver::from_request(&req)
            .unwrap()
            .solve_with_fallback(Algorithm::Fast)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InfeasibleProblem);
    }

    #[test]
    fn test_cancelled_heuristic_returns_partial_result() {
        let flag = Arc::new(AtomicBool::new(true));
        let res = Solver::from_request(&request(100, 0, &[(10, 10, 5)]))
            .unwrap()
            .with_cancel_flag(Arc::clone(&flag))
            .solve()
            .unwrap();
        assert!(flag.load(Ordering::Relaxed));
        assert_result_valid(&res, 5);
        assert!(res.unplaced.iter().all(|u| u.reason == UnplacedReason::TimeLimit));
        assert!(!res.is_optimal);
    }

    #[test]
    fn test_envelopes() {
        let ok = optimize(&request(100, 100, &[(10, 10, 2)]));
        assert!(ok.is_success());
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["algorithm"], "fast");
        assert_eq!(value["placements"].as_array().unwrap().len(), 2);

        let bad = optimize_json(r#"{"stock_width": 100, "pieces": "nope", "algorithm": "smart"}"#);
        assert_eq!(bad.error_kind(), Some(ErrorKind::InvalidInput));
        let value = serde_json::to_value(&bad).unwrap();
        assert_eq!(value["algorithm"], "smart");
    }
}
