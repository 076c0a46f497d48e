use crate::error::Result;
use crate::strategy::{Layout, PlacementStrategy, SolveContext};
use crate::types::{PieceInstance, Placement, Rect, UnplacedPiece, UnplacedReason};

/// Shelf packing, first fit decreasing height.
///
/// Shelves are rows as tall as the tallest piece still waiting. Each shelf
/// scans every waiting piece and keeps going past the ones that do not fit,
/// so a shelf can mix heights and leave gaps beneath its taller members.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShelfPacker;

impl PlacementStrategy for ShelfPacker {
    fn name(&self) -> &'static str {
        "fast"
    }

    fn place(&self, instances: &[PieceInstance], ctx: &SolveContext) -> Result<Layout> {
        Ok(pack_shelves(instances, ctx))
    }
}

#[derive(Debug, Clone, Copy)]
struct Queued<'a> {
    instance: &'a PieceInstance,
    rect: Rect,
    rotated: bool,
}

impl Queued<'_> {
    /// Rotate when the rotated piece fits and either the upright one does
    /// not, or rotating makes it strictly narrower.
    fn orient(&self, room: u32, shelf_h: u32) -> Option<(Rect, bool)> {
        let fits = |r: Rect| r.w <= room && r.h <= shelf_h;
        let upright_fits = fits(self.rect);
        if self.instance.allow_rotate && !self.rect.is_square() {
            let alt = self.rect.rotated();
            if fits(alt) && (!upright_fits || alt.w < self.rect.w) {
                return Some((alt, !self.rotated));
            }
        }
        upright_fits.then_some((self.rect, self.rotated))
    }
}

pub fn pack_shelves(instances: &[PieceInstance], ctx: &SolveContext) -> Layout {
    let stock = ctx.stock;
    let mut layout = Layout::default();

    // Pieces only fitting the sheet sideways start out rotated.
    let mut queue: Vec<Queued> = Vec::with_capacity(instances.len());
    for instance in instances {
        match instance.fitting_orientation(&stock) {
            Some((rect, rotated)) => queue.push(Queued {
                instance,
                rect,
                rotated,
            }),
            None => layout
                .unplaced
                .push(UnplacedPiece::new(instance, UnplacedReason::DoesNotFit)),
        }
    }

    // Stable: equal heights keep input order.
    queue.sort_by(|a, b| b.rect.h.cmp(&a.rect.h));

    let mut placed = vec![false; queue.len()];
    let mut shelf_y = 0u32;
    let mut leftover = UnplacedReason::NoSpace;

    while let Some(first) = placed.iter().position(|p| !p) {
        if ctx.should_stop() {
            leftover = UnplacedReason::TimeLimit;
            break;
        }

        let shelf_h = queue[first].rect.h;
        if let Some(h) = stock.height
            && shelf_y + shelf_h > h
        {
            break;
        }

        let mut cursor = 0u32;
        let mut count = 0usize;
        for (i, q) in queue.iter().enumerate() {
            if placed[i] {
                continue;
            }
            if let Some((rect, rotated)) = q.orient(stock.width - cursor, shelf_h) {
                layout
                    .placements
                    .push(Placement::new(q.instance, cursor, shelf_y, rotated));
                placed[i] = true;
                cursor += rect.w;
                count += 1;
                if cursor == stock.width {
                    break;
                }
            }
        }

        tracing::debug!(y = shelf_y, height = shelf_h, pieces = count, "closed shelf");
        shelf_y += shelf_h;
    }

    for (q, _) in queue.iter().zip(&placed).filter(|(_, p)| !**p) {
        layout
            .unplaced
            .push(UnplacedPiece::new(q.instance, leftover));
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::types::{PieceType, StockSheet};

    fn run(stock: StockSheet, pieces: Vec<PieceType>) -> Layout {
        let instances = expand(&pieces).unwrap();
        pack_shelves(&instances, &SolveContext::new(stock))
    }

    fn positions(layout: &Layout) -> Vec<(u32, u32, u32, u32)> {
        layout
            .placements
            .iter()
            .map(|p| (p.x, p.y, p.width, p.height))
            .collect()
    }

    #[test]
    fn test_mixed_sheet_layout() {
        let layout = run(
            StockSheet::bounded(1000, 800),
            vec![
                PieceType::new("a", 200, 300, 2),
                PieceType::new("b", 150, 200, 3),
                PieceType::new("c", 100, 100, 5),
            ],
        );
        assert!(layout.unplaced.is_empty());
        assert_eq!(
            positions(&layout),
            vec![
                (0, 0, 200, 300),
                (200, 0, 200, 300),
                (400, 0, 150, 200),
                (550, 0, 150, 200),
                (700, 0, 150, 200),
                (850, 0, 100, 100),
                (0, 300, 100, 100),
                (100, 300, 100, 100),
                (200, 300, 100, 100),
                (300, 300, 100, 100),
            ]
        );
        assert_eq!(layout.placed_area(), 260_000);
        assert_eq!(layout.consumed_length(), 400);
    }

    #[test]
    fn test_single_piece_on_roll_keeps_orientation() {
        let layout = run(StockSheet::unbounded(1200), vec![PieceType::new("a", 600, 400, 1)]);
        assert_eq!(positions(&layout), vec![(0, 0, 600, 400)]);
        assert!(!layout.placements[0].rotated);
        assert_eq!(layout.consumed_length(), 400);
    }

    #[test]
    fn test_scan_skips_past_misfits() {
        let layout = run(
            StockSheet::unbounded(10),
            vec![
                PieceType::new("big", 8, 5, 1).with_rotation(false),
                PieceType::new("mid", 5, 4, 1).with_rotation(false),
                PieceType::new("small", 2, 3, 1).with_rotation(false),
            ],
        );
        // "mid" does not fit next to "big", "small" does.
        assert_eq!(
            positions(&layout),
            vec![(0, 0, 8, 5), (8, 0, 2, 3), (0, 5, 5, 4)]
        );
        assert_eq!(layout.consumed_length(), 9);
    }

    #[test]
    fn test_rotates_into_remaining_row() {
        let layout = run(
            StockSheet::unbounded(10),
            vec![
                PieceType::new("a", 7, 5, 1).with_rotation(false),
                PieceType::new("b", 4, 3, 1),
            ],
        );
        assert_eq!(positions(&layout), vec![(0, 0, 7, 5), (7, 0, 3, 4)]);
        assert!(layout.placements[1].rotated);
    }

    #[test]
    fn test_prerotates_pieces_only_fitting_sideways() {
        let layout = run(StockSheet::unbounded(10), vec![PieceType::new("a", 20, 5, 1)]);
        assert_eq!(positions(&layout), vec![(0, 0, 5, 20)]);
        assert!(layout.placements[0].rotated);
    }

    #[test]
    fn test_oversized_piece_reported() {
        let layout = run(
            StockSheet::bounded(10, 10),
            vec![PieceType::new("huge", 12, 12, 1), PieceType::new("ok", 5, 5, 1)],
        );
        assert_eq!(layout.placements.len(), 1);
        assert_eq!(layout.unplaced.len(), 1);
        assert_eq!(layout.unplaced[0].piece_id, "huge");
        assert_eq!(layout.unplaced[0].reason, UnplacedReason::DoesNotFit);
    }

    #[test]
    fn test_stops_at_length_bound() {
        let layout = run(
            StockSheet::bounded(10, 10),
            vec![PieceType::new("a", 10, 6, 2).with_rotation(false)],
        );
        assert_eq!(layout.placements.len(), 1);
        assert_eq!(layout.unplaced.len(), 1);
        assert_eq!(layout.unplaced[0].reason, UnplacedReason::NoSpace);
    }

    #[test]
    fn test_cancelled_run_reports_time_limit() {
        let instances = expand(&[PieceType::new("a", 5, 5, 3)]).unwrap();
        let ctx = SolveContext::new(StockSheet::unbounded(10));
        ctx.cancelled.store(true, std::sync::atomic::Ordering::Relaxed);
        let layout = pack_shelves(&instances, &ctx);
        assert!(layout.placements.is_empty());
        assert_eq!(layout.unplaced.len(), 3);
        assert!(
            layout
                .unplaced
                .iter()
                .all(|u| u.reason == UnplacedReason::TimeLimit)
        );
    }
}
