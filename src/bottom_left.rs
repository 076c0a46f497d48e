use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::error::Result;
use crate::geometry::{Bounds, exposed_perimeter, overlaps_any};
use crate::strategy::{Layout, PlacementStrategy, SolveContext};
use crate::types::{PieceInstance, Placement, Rect, UnplacedPiece, UnplacedReason};

/// Priority order in which instances are placed. Ties keep input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKey {
    /// Area descending, then longest side descending.
    AreaFirst,
    /// Longest side descending, then area descending.
    MaxDimensionFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientationPolicy {
    /// Upright at the lowest-left anchor that fits anywhere, else rotated.
    FirstFit,
    /// Both orientations at each anchor; keep the one leaving the least
    /// exposed perimeter.
    LeastExposed,
}

/// Bottom-left fill: each piece goes to the lowest, then left-most, free
/// anchor. Variants differ only in ordering and orientation policy.
#[derive(Debug, Clone, Copy)]
pub struct BottomLeftFill {
    name: &'static str,
    order: OrderKey,
    orientation: OrientationPolicy,
}

impl BottomLeftFill {
    pub fn new(name: &'static str, order: OrderKey, orientation: OrientationPolicy) -> Self {
        Self {
            name,
            order,
            orientation,
        }
    }

    pub fn simple() -> Self {
        Self::new("simple", OrderKey::AreaFirst, OrientationPolicy::FirstFit)
    }

    pub fn improved() -> Self {
        Self::new("improved", OrderKey::MaxDimensionFirst, OrientationPolicy::FirstFit)
    }

    pub fn smart() -> Self {
        Self::new("smart", OrderKey::MaxDimensionFirst, OrientationPolicy::LeastExposed)
    }

    fn ordered<'a>(&self, instances: &'a [PieceInstance]) -> Vec<&'a PieceInstance> {
        let mut ordered: Vec<&PieceInstance> = instances.iter().collect();
        match self.order {
            OrderKey::AreaFirst => {
                ordered.sort_by_key(|i| (Reverse(i.area()), Reverse(i.rect.w.max(i.rect.h))))
            }
            OrderKey::MaxDimensionFirst => {
                ordered.sort_by_key(|i| (Reverse(i.rect.w.max(i.rect.h)), Reverse(i.area())))
            }
        }
        ordered
    }

    pub fn pack(&self, instances: &[PieceInstance], ctx: &SolveContext) -> Layout {
        let stock = ctx.stock;
        let mut frontier = Frontier::new();
        let mut layout = Layout::default();
        let mut stopped = false;

        for instance in self.ordered(instances) {
            if !stopped && ctx.should_stop() {
                stopped = true;
            }
            if stopped {
                layout
                    .unplaced
                    .push(UnplacedPiece::new(instance, UnplacedReason::TimeLimit));
                continue;
            }
            if instance.fitting_orientation(&stock).is_none() {
                layout
                    .unplaced
                    .push(UnplacedPiece::new(instance, UnplacedReason::DoesNotFit));
                continue;
            }

            let found = match self.orientation {
                OrientationPolicy::FirstFit => frontier.first_fit(instance, ctx),
                OrientationPolicy::LeastExposed => frontier.least_exposed(instance, ctx),
            };
            match found {
                Some((x, y, rect, rotated)) => {
                    frontier.insert(Bounds::new(x, y, rect.w, rect.h));
                    layout
                        .placements
                        .push(Placement::new(instance, x, y, rotated));
                }
                // The anchor scan gives up once the budget runs out.
                None if ctx.should_stop() => {
                    stopped = true;
                    layout
                        .unplaced
                        .push(UnplacedPiece::new(instance, UnplacedReason::TimeLimit));
                }
                None => layout
                    .unplaced
                    .push(UnplacedPiece::new(instance, UnplacedReason::NoSpace)),
            }
        }

        tracing::debug!(
            variant = self.name,
            placed = layout.placements.len(),
            anchors = frontier.xs.len() * frontier.ys.len(),
            "bottom-left fill finished"
        );
        layout
    }
}

impl PlacementStrategy for BottomLeftFill {
    fn name(&self) -> &'static str {
        self.name
    }

    fn place(&self, instances: &[PieceInstance], ctx: &SolveContext) -> Result<Layout> {
        Ok(self.pack(instances, ctx))
    }
}

/// Edges of placed pieces. Candidate anchors are every (x-edge, y-edge)
/// pair, visited lowest row first.
struct Frontier {
    xs: BTreeSet<u32>,
    ys: BTreeSet<u32>,
    placed: Vec<Bounds>,
}

impl Frontier {
    fn new() -> Self {
        Self {
            xs: BTreeSet::from([0]),
            ys: BTreeSet::from([0]),
            placed: Vec::new(),
        }
    }

    fn insert(&mut self, b: Bounds) {
        self.xs.insert(b.right());
        self.ys.insert(b.bottom());
        self.placed.push(b);
    }

    /// Anchor scans poll `ctx` once per row and come back empty when it
    /// says stop.
    fn lowest_left(&self, rect: Rect, ctx: &SolveContext) -> Option<(u32, u32)> {
        let stock = &ctx.stock;
        for &y in &self.ys {
            if stock.height.is_some_and(|h| y + rect.h > h) || ctx.should_stop() {
                break;
            }
            for &x in &self.xs {
                if x + rect.w > stock.width {
                    break;
                }
                if !overlaps_any(&Bounds::new(x, y, rect.w, rect.h), &self.placed) {
                    return Some((x, y));
                }
            }
        }
        None
    }

    fn first_fit(&self, instance: &PieceInstance, ctx: &SolveContext) -> Option<(u32, u32, Rect, bool)> {
        instance.orientations().find_map(|(rect, rotated)| {
            self.lowest_left(rect, ctx)
                .map(|(x, y)| (x, y, rect, rotated))
        })
    }

    fn least_exposed(
        &self,
        instance: &PieceInstance,
        ctx: &SolveContext,
    ) -> Option<(u32, u32, Rect, bool)> {
        let stock = &ctx.stock;
        for &y in &self.ys {
            if stock.height.is_some_and(|h| y >= h) || ctx.should_stop() {
                break;
            }
            for &x in &self.xs {
                if x >= stock.width {
                    break;
                }
                let mut best: Option<(u64, Rect, bool)> = None;
                for (rect, rotated) in instance.orientations() {
                    let b = Bounds::new(x, y, rect.w, rect.h);
                    if !b.within(stock) || overlaps_any(&b, &self.placed) {
                        continue;
                    }
                    let waste = exposed_perimeter(&b, &self.placed, stock);
                    if best.is_none_or(|(w, _, _)| waste < w) {
                        best = Some((waste, rect, rotated));
                    }
                }
                if let Some((_, rect, rotated)) = best {
                    return Some((x, y, rect, rotated));
                }
            }
        }
        None
    }
}
