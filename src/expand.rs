use crate::error::{OptimizeError, Result};
use crate::types::{MAX_DIMENSION, MAX_EXTENT, PieceInstance, PieceType};

/// Expand piece types into one instance per required copy.
///
/// Order is type order, then copy order within a type. Strategies break
/// ties on this order, so it must stay stable for identical input.
pub fn expand(pieces: &[PieceType]) -> Result<Vec<PieceInstance>> {
    if pieces.is_empty() {
        return Err(OptimizeError::invalid("no pieces to cut"));
    }

    let mut instances = Vec::new();
    let mut span: u64 = 0;
    for (type_index, piece) in pieces.iter().enumerate() {
        if piece.width == 0 || piece.height == 0 {
            return Err(OptimizeError::invalid(format!(
                "piece '{}' has non-positive dimensions {}x{}",
                piece.id, piece.width, piece.height
            )));
        }
        if piece.width > MAX_DIMENSION || piece.height > MAX_DIMENSION {
            return Err(OptimizeError::invalid(format!(
                "piece '{}' dimensions {}x{} exceed the maximum of {}",
                piece.id, piece.width, piece.height, MAX_DIMENSION
            )));
        }
        if piece.quantity == 0 {
            return Err(OptimizeError::invalid(format!(
                "piece '{}' has zero quantity",
                piece.id
            )));
        }

        // Every coordinate a strategy can produce is bounded by this sum.
        span += piece.width.max(piece.height) as u64 * piece.quantity as u64;
        if span > MAX_EXTENT {
            return Err(OptimizeError::invalid(
                "cut list too large: combined piece extent overflows the coordinate range",
            ));
        }

        for _ in 0..piece.quantity {
            instances.push(PieceInstance {
                id: instances.len(),
                type_index,
                piece_id: piece.id.clone(),
                rect: piece.rect(),
                allow_rotate: piece.allow_rotation,
            });
        }
    }

    tracing::debug!(types = pieces.len(), instances = instances.len(), "expanded cut list");
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_expand_quantities_in_order() {
        let pieces = vec![
            PieceType::new("a", 200, 300, 2),
            PieceType::new("b", 150, 200, 3),
            PieceType::new("c", 100, 100, 5),
        ];
        let instances = expand(&pieces).unwrap();
        assert_eq!(instances.len(), 10);

        let ids: Vec<&str> = instances.iter().map(|i| i.piece_id.as_str()).collect();
        assert_eq!(ids, ["a", "a", "b", "b", "b", "c", "c", "c", "c", "c"]);
        assert!(instances.iter().enumerate().all(|(n, i)| i.id == n));
        assert_eq!(instances[2].type_index, 1);
    }

    #[test]
    fn test_expand_is_deterministic() {
        let pieces = vec![
            PieceType::new("x", 10, 20, 4).with_rotation(false),
            PieceType::new("y", 30, 5, 2),
        ];
        assert_eq!(expand(&pieces).unwrap(), expand(&pieces).unwrap());
    }

    #[test]
    fn test_expand_rejects_bad_pieces() {
        let zero_width = vec![PieceType::new("a", 0, 10, 1)];
        assert_eq!(expand(&zero_width).unwrap_err().kind(), ErrorKind::InvalidInput);

        let zero_qty = vec![PieceType::new("a", 10, 10, 0)];
        assert_eq!(expand(&zero_qty).unwrap_err().kind(), ErrorKind::InvalidInput);

        assert_eq!(expand(&[]).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_expand_rejects_coordinate_overflow() {
        let huge = vec![PieceType::new("a", u32::MAX, 1, 2)];
        assert_eq!(expand(&huge).unwrap_err().kind(), ErrorKind::InvalidInput);

        let many = vec![PieceType::new("a", MAX_DIMENSION, 1, 3)];
        assert_eq!(expand(&many).unwrap_err().kind(), ErrorKind::InvalidInput);
    }
}
