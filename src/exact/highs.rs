use std::time::Instant;

use good_lp::{
    Expression, ProblemVariables, Solution, SolverModel, Variable, constraint, highs, variable,
};

use crate::error::{OptimizeError, Result};
use crate::exact::formulation::{Assignment, Formulation, Spot};
use crate::exact::{MilpBackend, SolutionStatus, SolveOutcome};
use crate::geometry::{Bounds, overlaps_any};
use crate::guillotine::is_guillotine;
use crate::strategy::SolveContext;

/// The placement model as a mixed-integer program, solved by HiGHS.
///
/// Each item gets integer x and y and one binary per orientation. Every pair
/// gets four binaries choosing the side that separates it (big-M). On
/// bounded stock all orientation binaries of an item may be zero, leaving it
/// out. Identical items are ordered by y. The guillotine restriction is not
/// modelled; a solution that violates it is discarded for the incumbent.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsBackend;

struct ItemVars {
    x: Variable,
    y: Variable,
    orient: Vec<Variable>,
    width: Expression,
    height: Expression,
    placed: Expression,
}

/// Left, right, below, above.
type Sides = [Variable; 4];

fn weighted(vars: &[Variable], weights: impl Iterator<Item = f64>) -> Expression {
    vars.iter()
        .zip(weights)
        .fold(Expression::from(0.0), |acc, (&v, w)| acc + w * v)
}

impl MilpBackend for HighsBackend {
    fn solve(
        &self,
        model: &Formulation,
        incumbent: Option<&Assignment>,
        ctx: &SolveContext,
    ) -> Result<SolveOutcome> {
        let keep = |status: SolutionStatus| -> Result<SolveOutcome> {
            incumbent
                .map(|a| SolveOutcome {
                    assignment: a.clone(),
                    status,
                    nodes: 0,
                })
                .ok_or_else(|| OptimizeError::SolverError("HiGHS returned no usable layout".into()))
        };
        if ctx.should_stop() {
            return keep(SolutionStatus::Feasible);
        }

        let width = model.width as f64;
        let length = model.length_limit as f64;
        let mut vars = ProblemVariables::new();

        let items: Vec<ItemVars> = model
            .items
            .iter()
            .map(|item| {
                let x = vars.add(variable().integer().min(0).max(model.width - item.min_width()));
                let y = vars.add(
                    variable()
                        .integer()
                        .min(0)
                        .max(model.length_limit.saturating_sub(item.min_height())),
                );
                let orient: Vec<Variable> = item
                    .orientations
                    .iter()
                    .map(|_| vars.add(variable().binary()))
                    .collect();
                ItemVars {
                    x,
                    y,
                    width: weighted(&orient, item.orientations.iter().map(|(r, _)| r.w as f64)),
                    height: weighted(&orient, item.orientations.iter().map(|(r, _)| r.h as f64)),
                    placed: weighted(&orient, item.orientations.iter().map(|_| 1.0)),
                    orient,
                }
            })
            .collect();

        let n = items.len();
        let mut sides: Vec<Sides> = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            if ctx.should_stop() {
                return keep(SolutionStatus::Feasible);
            }
            for _ in i + 1..n {
                sides.push(std::array::from_fn(|_| vars.add(variable().binary())));
            }
        }
        let len = vars.add(variable().min(0).max(length));

        let mut problem = if model.bounded {
            // One unit of area outweighs any length saving.
            let weight = length + 1.0;
            let area = model
                .items
                .iter()
                .zip(&items)
                .fold(Expression::from(0.0), |acc, (item, v)| {
                    acc + weighted(&v.orient, v.orient.iter().map(|_| item.area as f64 * weight))
                });
            vars.maximise(area - len).using(highs)
        } else {
            vars.minimise(len).using(highs)
        };
        problem.set_verbose(false);
        if let Some(deadline) = ctx.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            problem.set_time_limit(remaining.as_secs_f64());
        }

        for v in &items {
            problem = if model.bounded {
                problem.with(constraint!(v.placed.clone() <= 1.0))
            } else {
                problem.with(constraint!(v.placed.clone() == 1.0))
            };
            problem = problem
                .with(constraint!(v.x + v.width.clone() <= width))
                .with(constraint!(v.y + v.height.clone() <= len));
        }

        let mut pairs = sides.iter();
        for (i, a) in items.iter().enumerate() {
            if ctx.should_stop() {
                return keep(SolutionStatus::Feasible);
            }
            for b in &items[i + 1..] {
                let Some(&[left, right, below, above]) = pairs.next() else {
                    break;
                };
                problem = if model.bounded {
                    problem.with(constraint!(
                        left + right + below + above + 1.0 >= a.placed.clone() + b.placed.clone()
                    ))
                } else {
                    problem.with(constraint!(left + right + below + above >= 1.0))
                };
                problem = problem
                    .with(constraint!(a.x + a.width.clone() - b.x <= width - width * left))
                    .with(constraint!(b.x + b.width.clone() - a.x <= width - width * right))
                    .with(constraint!(a.y + a.height.clone() - b.y <= length - length * below))
                    .with(constraint!(b.y + b.height.clone() - a.y <= length - length * above));
            }
        }

        for (k, pair) in items.windows(2).enumerate() {
            if model.items[k].class != model.items[k + 1].class {
                continue;
            }
            problem = problem.with(constraint!(pair[0].y <= pair[1].y));
            if model.bounded {
                problem = problem.with(constraint!(pair[0].placed.clone() >= pair[1].placed.clone()));
            }
        }

        tracing::debug!(items = n, pairs = sides.len(), bounded = model.bounded, "solving with HiGHS");
        let solution = problem
            .solve()
            .map_err(|e| OptimizeError::SolverError(format!("HiGHS failed: {e}")))?;
        // HiGHS stops at the time limit it was given, so a run that ends
        // before the deadline has proven its answer.
        let finished = !ctx.should_stop();

        let assignment: Assignment = model
            .items
            .iter()
            .zip(&items)
            .map(|(item, v)| {
                let k = v.orient.iter().position(|&o| solution.value(o) > 0.5)?;
                let (rect, rotated) = item.orientations[k];
                Some(Spot {
                    x: solution.value(v.x).round().max(0.0) as u32,
                    y: solution.value(v.y).round().max(0.0) as u32,
                    rect,
                    rotated,
                })
            })
            .collect();

        if !is_feasible(model, &assignment) {
            tracing::debug!("HiGHS solution rejected, keeping the incumbent");
            return keep(SolutionStatus::Feasible);
        }
        let status = if finished {
            SolutionStatus::Optimal
        } else {
            SolutionStatus::Feasible
        };
        if let Some(seed) = incumbent {
            let (area, len) = model.score(&assignment);
            let (seed_area, seed_len) = model.score(seed);
            if seed_area > area || (seed_area == area && seed_len < len) {
                return keep(status);
            }
        }
        Ok(SolveOutcome {
            assignment,
            status,
            nodes: 0,
        })
    }
}

/// Rounded solver values can drift; check the layout against the model.
fn is_feasible(model: &Formulation, assignment: &Assignment) -> bool {
    if !model.bounded && assignment.iter().any(Option::is_none) {
        return false;
    }
    let mut placed: Vec<Bounds> = Vec::with_capacity(assignment.len());
    for spot in assignment.iter().flatten() {
        let b = spot.bounds();
        if b.right() > model.width || b.bottom() > model.length_limit || overlaps_any(&b, &placed) {
            return false;
        }
        placed.push(b);
    }
    !model.guillotine || is_guillotine(&placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::types::{PieceType, Rect, StockSheet};
    use std::sync::atomic::Ordering;

    fn model(stock: StockSheet, pieces: &[PieceType], limit: Option<u32>) -> Formulation {
        let instances = expand(pieces).unwrap();
        Formulation::build(&instances, &stock, limit, false).unwrap()
    }

    #[test]
    fn test_highs_minimizes_roll_length() {
        let m = model(
            StockSheet::unbounded(10),
            &[
                PieceType::new("a", 6, 6, 1).with_rotation(false),
                PieceType::new("b", 4, 3, 2).with_rotation(false),
            ],
            Some(9),
        );
        let out = HighsBackend
            .solve(&m, None, &SolveContext::new(StockSheet::unbounded(10)))
            .unwrap();
        assert_eq!(out.status, SolutionStatus::Optimal);
        assert_eq!(m.score(&out.assignment), (60, 6));
    }

    #[test]
    fn test_highs_bounded_leaves_pieces_out() {
        let stock = StockSheet::bounded(10, 10);
        let m = model(stock, &[PieceType::new("a", 6, 6, 3).with_rotation(false)], None);
        let out = HighsBackend.solve(&m, None, &SolveContext::new(stock)).unwrap();
        assert_eq!(m.score(&out.assignment).0, 36);
        assert_eq!(out.assignment.iter().flatten().count(), 1);
    }

    #[test]
    fn test_cancelled_keeps_incumbent() {
        let m = model(
            StockSheet::unbounded(10),
            &[PieceType::new("a", 6, 4, 2).with_rotation(false)],
            Some(8),
        );
        let spot = |y| {
            Some(Spot {
                x: 0,
                y,
                rect: Rect::new(6, 4),
                rotated: false,
            })
        };
        let incumbent = vec![spot(0), spot(4)];
        let ctx = SolveContext::new(StockSheet::unbounded(10));
        ctx.cancelled.store(true, Ordering::Relaxed);
        let out = HighsBackend.solve(&m, Some(&incumbent), &ctx).unwrap();
        assert_eq!(out.status, SolutionStatus::Feasible);
        assert_eq!(out.assignment, incumbent);

        let err = HighsBackend.solve(&m, None, &ctx).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SolverError);
    }

    #[test]
    fn test_rejects_overlapping_assignment() {
        let m = model(
            StockSheet::unbounded(10),
            &[PieceType::new("a", 6, 4, 2).with_rotation(false)],
            Some(8),
        );
        let on_top = Some(Spot {
            x: 0,
            y: 0,
            rect: Rect::new(6, 4),
            rotated: false,
        });
        assert!(!is_feasible(&m, &vec![on_top, on_top]));
        assert!(!is_feasible(&m, &vec![on_top, None]));
    }
}
