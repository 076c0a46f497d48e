//! Rectangle predicates shared by every placement strategy.

use crate::types::StockSheet;

/// An axis-aligned rectangle positioned on the sheet, top-left anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Bounds {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    /// Touching edges do not count as overlap.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Inside `[0,W)x[0,H)`; the length check is skipped on an unbounded roll.
    pub fn within(&self, stock: &StockSheet) -> bool {
        self.right() <= stock.width && stock.height.is_none_or(|h| self.bottom() <= h)
    }
}

pub fn overlaps_any(candidate: &Bounds, placed: &[Bounds]) -> bool {
    placed.iter().any(|p| p.overlaps(candidate))
}

fn shared_span(a0: u32, a1: u32, b0: u32, b1: u32) -> u64 {
    a1.min(b1).saturating_sub(a0.max(b0)) as u64
}

/// Length of the candidate's perimeter touching neither a sheet edge nor a
/// placed piece. Lower means the piece nests more tightly and leaves less
/// unusable space around it.
pub fn exposed_perimeter(candidate: &Bounds, placed: &[Bounds], stock: &StockSheet) -> u64 {
    let c = candidate;
    let perimeter = 2 * (c.w as u64 + c.h as u64);
    let mut contact = 0u64;

    if c.x == 0 {
        contact += c.h as u64;
    }
    if c.right() == stock.width {
        contact += c.h as u64;
    }
    if c.y == 0 {
        contact += c.w as u64;
    }
    if stock.height == Some(c.bottom()) {
        contact += c.w as u64;
    }

    for p in placed {
        if p.right() == c.x || c.right() == p.x {
            contact += shared_span(c.y, c.bottom(), p.y, p.bottom());
        }
        if p.bottom() == c.y || c.bottom() == p.y {
            contact += shared_span(c.x, c.right(), p.x, p.right());
        }
    }

    perimeter.saturating_sub(contact)
}
