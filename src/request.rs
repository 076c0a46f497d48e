//! Request/response contract shared by the CLI, the config store and the
//! HTTP server.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, OptimizeError, Result};
use crate::result::OptimizationResult;
use crate::strategy::Algorithm;
use crate::types::{MAX_DIMENSION, PieceType, StockSheet};

fn default_algorithm() -> String {
    Algorithm::Fast.name().to_string()
}

fn default_time_limit() -> f64 {
    60.0
}

fn default_true() -> bool {
    true
}

fn default_quantity() -> f64 {
    1.0
}

/// Numbers stay `f64` on the wire so `800.0` is accepted; `validate`
/// turns them into integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub stock_width: f64,
    /// 0 means an unbounded roll.
    #[serde(default)]
    pub stock_height: f64,
    pub pieces: Vec<PieceSpec>,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub guillotine_cut: bool,
    /// Seconds.
    #[serde(default = "default_time_limit")]
    pub time_limit: f64,
    /// Rotation for pieces that do not say otherwise.
    #[serde(default = "default_true")]
    pub allow_rotation: bool,
    #[serde(default)]
    pub name: String,
}

/// A piece type as an object or as one of the legacy array forms
/// `[w, h, q]`, `[w, h, q, allow_rotation]`, `[w, h, q, allow_rotation, description]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PieceSpec {
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        width: f64,
        height: f64,
        #[serde(default = "default_quantity")]
        quantity: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        allow_rotation: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Described(f64, f64, f64, bool, String),
    Rotatable(f64, f64, f64, bool),
    Plain(f64, f64, f64),
}

impl PieceSpec {
    pub fn plain(width: u32, height: u32, quantity: u32) -> Self {
        PieceSpec::Plain(width as f64, height as f64, quantity as f64)
    }

    fn to_piece_type(&self, index: usize, default_rotation: bool) -> Result<PieceType> {
        let (id, width, height, quantity, rotation, description) = match self {
            PieceSpec::Object {
                id,
                width,
                height,
                quantity,
                allow_rotation,
                description,
            } => (
                id.clone(),
                *width,
                *height,
                *quantity,
                *allow_rotation,
                description.clone(),
            ),
            PieceSpec::Described(w, h, q, rot, desc) => (None, *w, *h, *q, Some(*rot), Some(desc.clone())),
            PieceSpec::Rotatable(w, h, q, rot) => (None, *w, *h, *q, Some(*rot), None),
            PieceSpec::Plain(w, h, q) => (None, *w, *h, *q, None, None),
        };

        let id = id.unwrap_or_else(|| format!("piece_{index}"));
        let width = dimension(width, &format!("piece '{id}' width"))?;
        let height = dimension(height, &format!("piece '{id}' height"))?;
        let quantity = whole(quantity, u32::MAX as f64)
            .filter(|q| *q >= 1)
            .ok_or_else(|| {
                OptimizeError::invalid(format!(
                    "piece '{id}' quantity must be a positive integer, got {quantity}"
                ))
            })?;

        Ok(PieceType::new(id, width, height, quantity)
            .with_rotation(rotation.unwrap_or(default_rotation))
            .with_description(description.unwrap_or_else(|| format!("Piece {}", index + 1))))
    }
}

fn whole(value: f64, max: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= max).then_some(value as u32)
}

fn dimension(value: f64, what: &str) -> Result<u32> {
    whole(value, MAX_DIMENSION as f64)
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            OptimizeError::invalid(format!(
                "{what} must be a positive integer of at most {MAX_DIMENSION}, got {value}"
            ))
        })
}

/// A validated request, ready to solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub name: String,
    pub stock: StockSheet,
    pub pieces: Vec<PieceType>,
    pub algorithm: Algorithm,
    pub guillotine: bool,
    pub time_limit: Duration,
}

impl OptimizeRequest {
    pub fn new(stock_width: u32, stock_height: u32, pieces: Vec<PieceSpec>) -> Self {
        Self {
            stock_width: stock_width as f64,
            stock_height: stock_height as f64,
            pieces,
            algorithm: default_algorithm(),
            guillotine_cut: false,
            time_limit: default_time_limit(),
            allow_rotation: true,
            name: String::new(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Check every field. The algorithm name is checked first so an unknown
    /// name is reported even when the rest of the request is also bad.
    pub fn validate(&self) -> Result<Problem> {
        let algorithm: Algorithm = self.algorithm.parse()?;

        let width = dimension(self.stock_width, "stock_width")?;
        let stock = if self.stock_height == 0.0 {
            StockSheet::unbounded(width)
        } else {
            StockSheet::bounded(width, dimension(self.stock_height, "stock_height")?)
        };

        if self.time_limit.is_nan() || self.time_limit <= 0.0 {
            return Err(OptimizeError::invalid(format!(
                "time_limit must be a positive number of seconds, got {}",
                self.time_limit
            )));
        }
        let time_limit = Duration::try_from_secs_f64(self.time_limit).map_err(|e| {
            OptimizeError::invalid(format!("time_limit {} is out of range: {e}", self.time_limit))
        })?;

        let pieces = self
            .pieces
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.to_piece_type(i, self.allow_rotation))
            .collect::<Result<Vec<_>>>()?;
        if pieces.is_empty() {
            return Err(OptimizeError::invalid("no pieces to cut"));
        }

        Ok(Problem {
            name: self.name.clone(),
            stock,
            pieces,
            algorithm,
            guillotine: self.guillotine_cut,
            time_limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// The envelope every surface returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptimizeResponse {
    Success {
        success: bool,
        #[serde(flatten)]
        result: Box<OptimizationResult>,
    },
    Failure {
        success: bool,
        algorithm: String,
        error: ErrorBody,
    },
}

impl OptimizeResponse {
    pub fn ok(result: OptimizationResult) -> Self {
        OptimizeResponse::Success {
            success: true,
            result: Box::new(result),
        }
    }

    pub fn failed(algorithm: impl Into<String>, err: &OptimizeError) -> Self {
        OptimizeResponse::Failure {
            success: false,
            algorithm: algorithm.into(),
            error: ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OptimizeResponse::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            OptimizeResponse::Success { .. } => None,
            OptimizeResponse::Failure { error, .. } => Some(error.kind),
        }
    }
}
