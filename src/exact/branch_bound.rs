use crate::error::{OptimizeError, Result};
use crate::exact::formulation::{Assignment, Formulation, Spot};
use crate::exact::{MilpBackend, SolutionStatus, SolveOutcome};
use crate::geometry::{Bounds, overlaps_any};
use crate::guillotine::is_guillotine;
use crate::strategy::SolveContext;

/// Depth-first branch-and-bound over the placement model.
///
/// Items are decided in model order. Each item branches on y, then x, then
/// orientation, and on bounded stock finally on leaving it out. Identical
/// items are placed in increasing (y, x) order, and once one is left out so
/// are the rest of its class.
#[derive(Debug, Clone, Copy)]
pub struct BranchAndBound {
    /// Work between checks of the deadline and cancel flag. One unit is
    /// roughly one rectangle comparison.
    pub poll_interval: u64,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self {
            poll_interval: 2048,
        }
    }
}

#[derive(Debug, Clone)]
struct Best {
    assignment: Assignment,
    area: u64,
    length: u32,
}

impl Best {
    fn beaten_by(&self, area: u64, length: u32) -> bool {
        area > self.area || (area == self.area && length < self.length)
    }
}

struct Search<'a> {
    model: &'a Formulation,
    ctx: &'a SolveContext,
    poll_interval: u64,
    nodes: u64,
    work: u64,
    next_poll: u64,
    stopped: bool,
    current: Assignment,
    placed: Vec<Bounds>,
    best: Option<Best>,
    /// Sheet area on bounded stock.
    capacity: Option<u64>,
    /// Area of items `k..`.
    suffix_area: Vec<u64>,
    /// Largest minimum height among items `k..`.
    suffix_height: Vec<u32>,
}

impl Search<'_> {
    fn pruned(&self, k: usize, area: u64, length: u32) -> bool {
        let Some(best) = &self.best else {
            return false;
        };
        let all_in = area + self.suffix_area[k];
        let ub = self.capacity.map_or(all_in, |c| all_in.min(c));
        if ub != best.area {
            return ub < best.area;
        }

        // Matching the best area needs at least this much length.
        let mut lb = length.max(ub.div_ceil(self.model.width as u64) as u32);
        if ub == all_in {
            lb = lb.max(self.suffix_height[k]);
        }
        lb >= best.length
    }

    fn length_cap(&self) -> u32 {
        match &self.best {
            Some(best) if !self.model.bounded => best.length.saturating_sub(1),
            _ => self.model.length_limit,
        }
    }

    /// Charge `units` of work and poll the context when a poll is due.
    fn spend(&mut self, units: u64) -> bool {
        self.work += units;
        if self.work >= self.next_poll {
            self.next_poll = self.work + self.poll_interval;
            if self.ctx.should_stop() {
                self.stopped = true;
            }
        }
        self.stopped
    }

    fn offer(&mut self, area: u64, length: u32) {
        if self.best.as_ref().is_some_and(|b| !b.beaten_by(area, length)) {
            return;
        }
        if self.model.guillotine {
            let n = self.placed.len() as u64;
            if self.spend(n * n) || !is_guillotine(&self.placed) {
                return;
            }
        }
        self.best = Some(Best {
            assignment: self.current.clone(),
            area,
            length,
        });
    }

    fn visit(&mut self, k: usize, area: u64, length: u32) {
        self.nodes += 1;
        if self.spend(1) {
            return;
        }

        let model = self.model;
        if k == model.items.len() {
            self.offer(area, length);
            return;
        }
        if self.pruned(k, area, length) {
            return;
        }

        let item = &model.items[k];
        let twin = (k > 0 && model.items[k - 1].class == item.class).then(|| self.current[k - 1]);
        if twin == Some(None) {
            self.visit(k + 1, area, length);
            return;
        }
        let after = twin.flatten().map(|s| (s.y, s.x));

        let min_w = item.min_width();
        let min_h = item.min_height();
        for &y in &model.y_domain {
            if y + min_h > self.length_cap() {
                break;
            }
            for &x in &model.x_domain {
                if x + min_w > model.width {
                    break;
                }
                if self.spend(1 + self.placed.len() as u64) {
                    return;
                }
                if after.is_some_and(|a| (y, x) <= a) {
                    continue;
                }
                for &(rect, rotated) in &item.orientations {
                    let b = Bounds::new(x, y, rect.w, rect.h);
                    if b.right() > model.width
                        || b.bottom() > self.length_cap()
                        || overlaps_any(&b, &self.placed)
                    {
                        continue;
                    }
                    self.current[k] = Some(Spot { x, y, rect, rotated });
                    self.placed.push(b);
                    self.visit(k + 1, area + item.area, length.max(b.bottom()));
                    self.placed.pop();
                    self.current[k] = None;
                    if self.stopped {
                        return;
                    }
                }
            }
        }

        if model.bounded {
            self.visit(k + 1, area, length);
        }
    }
}

impl MilpBackend for BranchAndBound {
    fn solve(
        &self,
        model: &Formulation,
        incumbent: Option<&Assignment>,
        ctx: &SolveContext,
    ) -> Result<SolveOutcome> {
        let n = model.items.len();
        let mut suffix_area = vec![0u64; n + 1];
        let mut suffix_height = vec![0u32; n + 1];
        for k in (0..n).rev() {
            suffix_area[k] = suffix_area[k + 1] + model.items[k].area;
            suffix_height[k] = suffix_height[k + 1].max(model.items[k].min_height());
        }
        let capacity = model
            .bounded
            .then(|| model.width as u64 * model.length_limit as u64);

        let best = incumbent.map(|a| {
            let (area, length) = model.score(a);
            Best {
                assignment: a.clone(),
                area,
                length,
            }
        });

        let total = suffix_area[0];
        let area_ub = capacity.map_or(total, |c| total.min(c));
        let length_lb = (area_ub.div_ceil(model.width as u64) as u32).max(suffix_height[0]);
        if let Some(b) = &best
            && b.area == area_ub
            && (area_ub < total || b.length <= length_lb)
        {
            tracing::debug!(area = b.area, length = b.length, "incumbent meets the lower bound");
            return Ok(SolveOutcome {
                assignment: b.assignment.clone(),
                status: SolutionStatus::Optimal,
                nodes: 0,
            });
        }

        let mut search = Search {
            model,
            ctx,
            poll_interval: self.poll_interval.max(1),
            nodes: 0,
            work: 0,
            next_poll: 0,
            stopped: ctx.should_stop(),
            current: vec![None; n],
            placed: Vec::with_capacity(n),
            best,
            capacity,
            suffix_area,
            suffix_height,
        };
        if !search.stopped {
            search.visit(0, 0, 0);
        }

        tracing::debug!(
            nodes = search.nodes,
            work = search.work,
            stopped = search.stopped,
            "branch-and-bound finished"
        );

        let status = if search.stopped {
            SolutionStatus::Feasible
        } else {
            SolutionStatus::Optimal
        };
        let nodes = search.nodes;
        match search.best {
            Some(best) => Ok(SolveOutcome {
                assignment: best.assignment,
                status,
                nodes,
            }),
            None => Err(OptimizeError::SolverError(
                "search ended without a feasible layout".into(),
            )),
        }
    }
}
