use serde::{Deserialize, Serialize};

use crate::geometry::Bounds;

/// Largest accepted sheet or piece dimension.
pub const MAX_DIMENSION: u32 = 1 << 30;

/// Largest accepted sum of piece extents, which bounds every coordinate on
/// an unbounded roll. Together with `MAX_DIMENSION` this keeps `x + w` and
/// `y + h` inside `u32`.
pub const MAX_EXTENT: u64 = 1 << 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn rotated(&self) -> Self {
        Self {
            w: self.h,
            h: self.w,
        }
    }

    pub fn is_square(&self) -> bool {
        self.w == self.h
    }

    pub fn fits_in(&self, other: &Rect) -> bool {
        self.w <= other.w && self.h <= other.h
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// The stock sheet or roll. `height == None` is an unbounded roll whose
/// consumed length is minimized instead of checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockSheet {
    pub width: u32,
    pub height: Option<u32>,
}

impl StockSheet {
    pub fn bounded(width: u32, height: u32) -> Self {
        Self {
            width,
            height: Some(height),
        }
    }

    pub fn unbounded(width: u32) -> Self {
        Self {
            width,
            height: None,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.height.is_some()
    }

    pub fn area(&self) -> Option<u64> {
        self.height.map(|h| self.width as u64 * h as u64)
    }

    /// Whether a rectangle fits an empty sheet in the given orientation.
    pub fn admits(&self, rect: Rect) -> bool {
        rect.w <= self.width && self.height.is_none_or(|h| rect.h <= h)
    }
}

impl std::fmt::Display for StockSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.height {
            Some(h) => write!(f, "{}x{}", self.width, h),
            None => write!(f, "{}x(unbounded)", self.width),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceType {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub quantity: u32,
    pub allow_rotation: bool,
    pub description: String,
}

impl PieceType {
    pub fn new(id: impl Into<String>, width: u32, height: u32, quantity: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            quantity,
            allow_rotation: true,
            description: String::new(),
        }
    }

    pub fn with_rotation(mut self, allow: bool) -> Self {
        self.allow_rotation = allow;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.width, self.height)
    }
}

/// One copy of a piece type, produced by expansion and owned by a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceInstance {
    pub id: usize,
    pub type_index: usize,
    pub piece_id: String,
    pub rect: Rect,
    pub allow_rotate: bool,
}

impl PieceInstance {
    /// Upright orientation first, then the rotated one when allowed and distinct.
    pub fn orientations(&self) -> impl Iterator<Item = (Rect, bool)> + use<> {
        let upright = self.rect;
        let rotated = (self.allow_rotate && !upright.is_square()).then(|| (upright.rotated(), true));
        std::iter::once((upright, false)).chain(rotated)
    }

    /// The first orientation that fits an empty sheet, if any.
    pub fn fitting_orientation(&self, stock: &StockSheet) -> Option<(Rect, bool)> {
        self.orientations().find(|&(r, _)| stock.admits(r))
    }

    pub fn area(&self) -> u64 {
        self.rect.area()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub instance_id: usize,
    pub piece_id: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: u64,
    pub rotated: bool,
}

impl Placement {
    pub fn new(instance: &PieceInstance, x: u32, y: u32, rotated: bool) -> Self {
        let rect = if rotated {
            instance.rect.rotated()
        } else {
            instance.rect
        };
        Self {
            instance_id: instance.id,
            piece_id: instance.piece_id.clone(),
            x,
            y,
            width: rect.w,
            height: rect.h,
            area: rect.area(),
            rotated,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnplacedReason {
    /// Exceeds the stock in every allowed orientation.
    DoesNotFit,
    /// The sheet has no room left for it.
    NoSpace,
    /// The time budget ran out before it was considered.
    TimeLimit,
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UnplacedReason::DoesNotFit => "does not fit the stock",
            UnplacedReason::NoSpace => "no space left",
            UnplacedReason::TimeLimit => "time limit reached",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnplacedPiece {
    pub instance_id: usize,
    pub piece_id: String,
    pub width: u32,
    pub height: u32,
    pub reason: UnplacedReason,
}

impl UnplacedPiece {
    pub fn new(instance: &PieceInstance, reason: UnplacedReason) -> Self {
        Self {
            instance_id: instance.id,
            piece_id: instance.piece_id.clone(),
            width: instance.rect.w,
            height: instance.rect.h,
            reason,
        }
    }
}
