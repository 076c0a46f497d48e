use std::cmp::Reverse;
use std::collections::HashMap;

use crate::error::{OptimizeError, Result};
use crate::geometry::Bounds;
use crate::strategy::Layout;
use crate::types::{PieceInstance, Placement, Rect, StockSheet, UnplacedPiece, UnplacedReason};

/// Largest position domain, in units of the common divisor of all piece
/// dimensions, the model will enumerate.
pub const MAX_DOMAIN_SPAN: u32 = 1 << 20;

/// One placement decision: which instance, and the orientations it may take.
#[derive(Debug, Clone)]
pub struct Item {
    /// Index into the instance slice the model was built from.
    pub instance: usize,
    pub instance_id: usize,
    /// Items with equal class are interchangeable.
    pub class: usize,
    pub orientations: Vec<(Rect, bool)>,
    pub area: u64,
}

impl Item {
    pub fn min_width(&self) -> u32 {
        self.orientations.iter().map(|(r, _)| r.w).min().unwrap_or(0)
    }

    pub fn min_height(&self) -> u32 {
        self.orientations.iter().map(|(r, _)| r.h).min().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spot {
    pub x: u32,
    pub y: u32,
    pub rect: Rect,
    pub rotated: bool,
}

impl Spot {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.rect.w, self.rect.h)
    }
}

/// Values for every decision, indexed like `Formulation::items`.
/// `None` leaves the item out, which only bounded stock permits.
pub type Assignment = Vec<Option<Spot>>;

/// The placement model handed to a backend.
///
/// Each item picks an orientation and a position from `x_domain` and
/// `y_domain`, the normal patterns: subset sums of piece dimensions. Some
/// optimal packing puts every piece at such a position. Any two placed items
/// must be separated left, right, above or below. On bounded stock an item
/// may be left out and the objective is placed area, then length. On an
/// unbounded roll every item is placed and the objective is length.
#[derive(Debug, Clone)]
pub struct Formulation {
    pub width: u32,
    pub length_limit: u32,
    pub bounded: bool,
    pub guillotine: bool,
    pub items: Vec<Item>,
    pub x_domain: Vec<u32>,
    pub y_domain: Vec<u32>,
}

impl Formulation {
    /// `length_limit` caps positions on an unbounded roll. Without one the
    /// model allows every piece stacked in a single column.
    pub fn build(
        instances: &[PieceInstance],
        stock: &StockSheet,
        length_limit: Option<u32>,
        guillotine: bool,
    ) -> Result<Self> {
        let mut classes: HashMap<(Rect, bool), usize> = HashMap::new();
        let mut items = Vec::with_capacity(instances.len());
        for (index, instance) in instances.iter().enumerate() {
            let orientations: Vec<(Rect, bool)> = instance
                .orientations()
                .filter(|&(r, _)| stock.admits(r))
                .collect();
            if orientations.is_empty() {
                return Err(does_not_fit(instance, stock));
            }
            let next = classes.len();
            let class = *classes
                .entry((instance.rect, instance.allow_rotate))
                .or_insert(next);
            items.push(Item {
                instance: index,
                instance_id: instance.id,
                class,
                orientations,
                area: instance.area(),
            });
        }
        items.sort_by_key(|item| (Reverse(item.area), item.class, item.instance));

        let length_limit = match stock.height {
            Some(h) => h,
            None => length_limit.unwrap_or_else(|| items.iter().map(Item::min_height).sum()),
        };

        let unit = items
            .iter()
            .flat_map(|item| item.orientations.iter().flat_map(|(r, _)| [r.w, r.h]))
            .fold(0, gcd)
            .max(1);
        let min_w = items.iter().map(Item::min_width).min().unwrap_or(0);
        let min_h = items.iter().map(Item::min_height).min().unwrap_or(0);
        let widths: Vec<Vec<u32>> = items.iter().map(|i| dims(i, |r| r.w)).collect();
        let heights: Vec<Vec<u32>> = items.iter().map(|i| dims(i, |r| r.h)).collect();
        let x_domain = normal_patterns(&widths, stock.width.saturating_sub(min_w), unit)?;
        let y_domain = normal_patterns(&heights, length_limit.saturating_sub(min_h), unit)?;

        tracing::debug!(
            items = items.len(),
            classes = classes.len(),
            x_positions = x_domain.len(),
            y_positions = y_domain.len(),
            length_limit,
            "built placement model"
        );

        Ok(Self {
            width: stock.width,
            length_limit,
            bounded: stock.is_bounded(),
            guillotine,
            items,
            x_domain,
            y_domain,
        })
    }

    /// Placed area and consumed length of an assignment.
    pub fn score(&self, assignment: &Assignment) -> (u64, u32) {
        assignment
            .iter()
            .flatten()
            .fold((0, 0), |(area, len), s| (area + s.rect.area(), len.max(s.y + s.rect.h)))
    }

    /// Express a heuristic layout in this model's terms.
    pub fn assignment_from(&self, layout: &Layout) -> Option<Assignment> {
        let slots: HashMap<usize, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(slot, item)| (item.instance_id, slot))
            .collect();
        let mut assignment = vec![None; self.items.len()];
        for p in &layout.placements {
            let slot = *slots.get(&p.instance_id)?;
            assignment[slot] = Some(Spot {
                x: p.x,
                y: p.y,
                rect: Rect::new(p.width, p.height),
                rotated: p.rotated,
            });
        }
        if !self.bounded && assignment.iter().any(Option::is_none) {
            return None;
        }
        Some(assignment)
    }

    pub fn to_layout(
        &self,
        instances: &[PieceInstance],
        assignment: &Assignment,
        proven_optimal: bool,
    ) -> Layout {
        let mut layout = Layout {
            proven_optimal,
            ..Layout::default()
        };
        for (item, spot) in self.items.iter().zip(assignment) {
            let instance = &instances[item.instance];
            match spot {
                Some(s) => layout
                    .placements
                    .push(Placement::new(instance, s.x, s.y, s.rotated)),
                None => layout
                    .unplaced
                    .push(UnplacedPiece::new(instance, UnplacedReason::NoSpace)),
            }
        }
        layout.placements.sort_by_key(|p| p.instance_id);
        layout.unplaced.sort_by_key(|u| u.instance_id);
        layout
    }
}

pub(super) fn does_not_fit(instance: &PieceInstance, stock: &StockSheet) -> OptimizeError {
    OptimizeError::InfeasibleProblem(format!(
        "piece '{}' ({}) does not fit the {} stock in any allowed orientation",
        instance.piece_id, instance.rect, stock
    ))
}

fn dims(item: &Item, side: impl Fn(&Rect) -> u32) -> Vec<u32> {
    let mut out: Vec<u32> = item.orientations.iter().map(|(r, _)| side(r)).collect();
    out.dedup();
    out
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Every sum of at most one size per item that does not exceed `limit`.
/// All sizes must be multiples of `unit`.
fn normal_patterns(choices: &[Vec<u32>], limit: u32, unit: u32) -> Result<Vec<u32>> {
    let span = limit / unit;
    if span > MAX_DOMAIN_SPAN {
        return Err(OptimizeError::SolverError(format!(
            "position domain of {span} steps exceeds the model limit of {MAX_DOMAIN_SPAN}"
        )));
    }

    // Bitset over 0..=span; bit s set when s units are reachable.
    let span = span as usize;
    let words = span / 64 + 1;
    let mut reachable = vec![0u64; words];
    reachable[0] = 1;
    for sizes in choices {
        let before = reachable.clone();
        for &size in sizes {
            or_shifted(&mut reachable, &before, (size / unit) as usize);
        }
    }
    if let Some(last) = reachable.last_mut() {
        let used = span % 64 + 1;
        if used < 64 {
            *last &= (1u64 << used) - 1;
        }
    }

    Ok((0..=span)
        .filter(|&s| (reachable[s / 64] >> (s % 64)) & 1 == 1)
        .map(|s| s as u32 * unit)
        .collect())
}

/// `dst |= src << shift`, dropping bits past the end.
fn or_shifted(dst: &mut [u64], src: &[u64], shift: usize) {
    let (words, bits) = (shift / 64, shift % 64);
    for i in (words..dst.len()).rev() {
        let j = i - words;
        let mut v = src[j] << bits;
        if bits > 0 && j > 0 {
            v |= src[j - 1] >> (64 - bits);
        }
        dst[i] |= v;
    }
}
