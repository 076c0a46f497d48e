//! Two-dimensional cutting-stock optimization: place rectangular pieces on
//! a single sheet or roll with one exact and several heuristic strategies.

pub mod bottom_left;
pub mod config;
pub mod error;
pub mod exact;
pub mod expand;
pub mod geometry;
pub mod guillotine;
pub mod metrics;
pub mod request;
pub mod result;
pub mod shelf;
pub mod solver;
pub mod strategy;
pub mod types;

pub use error::{ErrorKind, OptimizeError, Result};
pub use request::{OptimizeRequest, OptimizeResponse, PieceSpec, Problem};
pub use result::OptimizationResult;
pub use solver::{Solver, optimize, optimize_json};
pub use strategy::Algorithm;
pub use types::{PieceType, Placement, StockSheet, UnplacedReason};
