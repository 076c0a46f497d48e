use crate::geometry::Bounds;
use crate::strategy::Layout;
use crate::types::{PieceInstance, Placement, Rect, StockSheet, UnplacedPiece, UnplacedReason};

#[derive(Debug, Clone, Copy)]
pub struct FreeRect {
    pub x: u32,
    pub y: u32,
    pub rect: Rect,
}

/// Free-rectangle packer where every split is a full cut of the free
/// rectangle it came from, so any layout it builds is guillotine-cuttable.
#[derive(Debug, Clone)]
pub struct GuillotineBin {
    pub free_rects: Vec<FreeRect>,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ScoreStrategy {
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
}

impl ScoreStrategy {
    pub const ALL: [ScoreStrategy; 3] = [
        ScoreStrategy::BestAreaFit,
        ScoreStrategy::BestShortSideFit,
        ScoreStrategy::BestLongSideFit,
    ];
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredPlacement {
    pub free_idx: usize,
    pub rect: Rect,
    pub rotated: bool,
    pub score: (u64, u64),
}

impl GuillotineBin {
    pub fn new(area: Rect) -> Self {
        Self {
            free_rects: vec![FreeRect {
                x: 0,
                y: 0,
                rect: area,
            }],
            placements: Vec::new(),
        }
    }

    pub fn find_best(
        &self,
        instance: &PieceInstance,
        strategy: ScoreStrategy,
    ) -> Option<ScoredPlacement> {
        let mut best: Option<ScoredPlacement> = None;

        for (idx, free) in self.free_rects.iter().enumerate() {
            for (rect, rotated) in instance.orientations() {
                if !rect.fits_in(&free.rect) {
                    continue;
                }
                let score = Self::score(rect, free.rect, strategy);
                if best.is_none_or(|b| score < b.score) {
                    best = Some(ScoredPlacement {
                        free_idx: idx,
                        rect,
                        rotated,
                        score,
                    });
                }
            }
        }

        best
    }

    fn score(piece: Rect, free: Rect, strategy: ScoreStrategy) -> (u64, u64) {
        let short = (free.w - piece.w).min(free.h - piece.h) as u64;
        let long = (free.w - piece.w).max(free.h - piece.h) as u64;
        match strategy {
            ScoreStrategy::BestAreaFit => (free.area() - piece.area(), short),
            ScoreStrategy::BestShortSideFit => (short, long),
            ScoreStrategy::BestLongSideFit => (long, short),
        }
    }

    pub fn place(&mut self, scored: ScoredPlacement, instance: &PieceInstance) -> Placement {
        let free = self.free_rects[scored.free_idx];
        let placement = Placement::new(instance, free.x, free.y, scored.rotated);

        // Preserve free-rect order so ties resolve the same way every run.
        self.free_rects.remove(scored.free_idx);
        self.split(free, scored.rect);
        self.placements.push(placement.clone());

        placement
    }

    fn split(&mut self, free: FreeRect, placed: Rect) {
        let right_w = free.rect.w - placed.w;
        let bottom_h = free.rect.h - placed.h;

        if right_w > 0 && bottom_h > 0 {
            // Cut along the shorter leftover axis first.
            let (right, bottom) = if right_w < bottom_h {
                (Rect::new(right_w, placed.h), Rect::new(free.rect.w, bottom_h))
            } else {
                (Rect::new(right_w, free.rect.h), Rect::new(placed.w, bottom_h))
            };
            self.free_rects.push(FreeRect {
                x: free.x + placed.w,
                y: free.y,
                rect: right,
            });
            self.free_rects.push(FreeRect {
                x: free.x,
                y: free.y + placed.h,
                rect: bottom,
            });
        } else if right_w > 0 {
            self.free_rects.push(FreeRect {
                x: free.x + placed.w,
                y: free.y,
                rect: Rect::new(right_w, free.rect.h),
            });
        } else if bottom_h > 0 {
            self.free_rects.push(FreeRect {
                x: free.x,
                y: free.y + placed.h,
                rect: Rect::new(free.rect.w, bottom_h),
            });
        }
    }
}

/// Greedy guillotine packing of all instances in area-descending order.
///
/// On an unbounded roll the bin is as long as every piece stacked in its
/// fitting orientation.
pub fn pack_guillotine(
    instances: &[PieceInstance],
    stock: &StockSheet,
    strategy: ScoreStrategy,
) -> Layout {
    let mut layout = Layout::default();
    let mut fitting: Vec<&PieceInstance> = Vec::with_capacity(instances.len());
    let mut stacked: u32 = 0;
    for instance in instances {
        match instance.fitting_orientation(stock) {
            Some((rect, _)) => {
                stacked += rect.h;
                fitting.push(instance);
            }
            None => layout
                .unplaced
                .push(UnplacedPiece::new(instance, UnplacedReason::DoesNotFit)),
        }
    }
    fitting.sort_by_key(|i| std::cmp::Reverse(i.area()));

    let mut bin = GuillotineBin::new(Rect::new(stock.width, stock.height.unwrap_or(stacked)));
    for instance in fitting {
        match bin.find_best(instance, strategy) {
            Some(scored) => {
                bin.place(scored, instance);
            }
            None => layout
                .unplaced
                .push(UnplacedPiece::new(instance, UnplacedReason::NoSpace)),
        }
    }

    layout.placements = bin.placements;
    layout
}

/// Whether the rectangles can be separated by recursive edge-to-edge cuts.
pub fn is_guillotine(pieces: &[Bounds]) -> bool {
    if pieces.len() <= 1 {
        return true;
    }

    for vertical in [true, false] {
        let span = |b: &Bounds| if vertical { (b.x, b.right()) } else { (b.y, b.bottom()) };
        for cut in pieces.iter().map(|b| span(b).1) {
            if pieces.iter().any(|b| {
                let (lo, hi) = span(b);
                lo < cut && cut < hi
            }) {
                continue;
            }
            let (before, after): (Vec<Bounds>, Vec<Bounds>) =
                pieces.iter().partition(|b| span(b).1 <= cut);
            if before.is_empty() || after.is_empty() {
                continue;
            }
            // Any valid cut of a guillotine layout leaves guillotine halves.
            return is_guillotine(&before) && is_guillotine(&after);
        }
    }

    false
}
