use std::collections::HashSet;
use std::time::Duration;

use cutting_stock::geometry::Bounds;
use cutting_stock::guillotine::is_guillotine;
use cutting_stock::request::Problem;
use cutting_stock::{Algorithm, OptimizationResult, PieceType, Solver, StockSheet};
use proptest::prelude::*;

fn piece_types(max_side: u32, max_qty: u32, max_types: usize) -> impl Strategy<Value = Vec<PieceType>> {
    prop::collection::vec(
        (1..=max_side, 1..=max_side, 1..=max_qty, any::<bool>()),
        1..=max_types,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (w, h, q, rot))| PieceType::new(format!("p{i}"), w, h, q).with_rotation(rot))
            .collect()
    })
}

fn stocks() -> impl Strategy<Value = StockSheet> {
    prop_oneof![
        (10u32..=60, 10u32..=60).prop_map(|(w, h)| StockSheet::bounded(w, h)),
        (10u32..=60).prop_map(StockSheet::unbounded),
    ]
}

fn solve(stock: StockSheet, pieces: Vec<PieceType>, algorithm: Algorithm, guillotine: bool) -> OptimizationResult {
    Solver::new(Problem {
        name: String::new(),
        stock,
        pieces,
        algorithm,
        guillotine,
        time_limit: Duration::from_millis(200),
    })
    .solve()
    .unwrap()
}

fn check_layout(res: &OptimizationResult, pieces: &[PieceType]) -> Result<(), TestCaseError> {
    let stock = StockSheet {
        width: res.stock_width,
        height: res.stock_height,
    };
    let bounds: Vec<Bounds> = res.placements.iter().map(|p| p.bounds()).collect();
    for (i, b) in bounds.iter().enumerate() {
        prop_assert!(b.within(&stock), "{:?} leaves {}", b, stock);
        for other in &bounds[i + 1..] {
            prop_assert!(!b.overlaps(other), "{:?} overlaps {:?}", b, other);
        }
    }

    let expected: usize = pieces.iter().map(|p| p.quantity as usize).sum();
    let ids: HashSet<usize> = res
        .placements
        .iter()
        .map(|p| p.instance_id)
        .chain(res.unplaced.iter().map(|u| u.instance_id))
        .collect();
    prop_assert_eq!(res.placements.len() + res.unplaced.len(), expected);
    prop_assert_eq!(ids.len(), expected);

    let area: u64 = res.placements.iter().map(|p| p.width as u64 * p.height as u64).sum();
    prop_assert_eq!(area, res.used_area);
    prop_assert!(res.used_area <= res.total_area);
    prop_assert!((0.0..=100.0).contains(&res.waste_percentage));
    prop_assert!(res.execution_time >= 0.0);
    prop_assert_eq!(res.sheets_used, 1);

    // Rotation only where the type allows it.
    let mut first_id = 0;
    for piece in pieces {
        let ids = first_id..first_id + piece.quantity as usize;
        first_id = ids.end;
        for p in res.placements.iter().filter(|p| ids.contains(&p.instance_id)) {
            prop_assert!(!p.rotated || piece.allow_rotation);
            let placed = if p.rotated { (p.height, p.width) } else { (p.width, p.height) };
            prop_assert_eq!(placed, (piece.width, piece.height));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn heuristic_layouts_are_valid(stock in stocks(), pieces in piece_types(30, 4, 6)) {
        for algorithm in [Algorithm::Fast, Algorithm::Simple, Algorithm::Improved, Algorithm::Smart] {
            let res = solve(stock, pieces.clone(), algorithm, false);
            check_layout(&res, &pieces)?;
            prop_assert!(!res.is_optimal);
        }
    }

    #[test]
    fn heuristics_are_deterministic(stock in stocks(), pieces in piece_types(30, 3, 5)) {
        for algorithm in [Algorithm::Fast, Algorithm::Simple, Algorithm::Improved, Algorithm::Smart] {
            let a = solve(stock, pieces.clone(), algorithm, false);
            let b = solve(stock, pieces.clone(), algorithm, false);
            prop_assert_eq!(&a.placements, &b.placements);
            prop_assert_eq!(&a.unplaced, &b.unplaced);
        }
    }

    #[test]
    fn unbounded_rolls_place_every_fitting_piece(width in 10u32..=60, pieces in piece_types(30, 3, 5)) {
        let stock = StockSheet::unbounded(width);
        for algorithm in [Algorithm::Fast, Algorithm::Simple, Algorithm::Improved, Algorithm::Smart] {
            let res = solve(stock, pieces.clone(), algorithm, false);
            let misfits: usize = pieces
                .iter()
                .filter(|p| p.width > width && !(p.allow_rotation && p.height <= width))
                .map(|p| p.quantity as usize)
                .sum();
            prop_assert_eq!(res.unplaced.len(), misfits);
        }
    }
}

proptest! {
    // Each case runs the exact search up to its time limit.
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn exact_layouts_are_valid(
        width in 8u32..=20,
        height in prop::option::of(8u32..=20),
        pieces in piece_types(8, 2, 3),
        guillotine in any::<bool>(),
    ) {
        let stock = StockSheet { width, height };
        let fits = pieces.iter().all(|p| {
            let upright = p.rect();
            stock.admits(upright) || (p.allow_rotation && stock.admits(upright.rotated()))
        });
        prop_assume!(fits);

        let res = solve(stock, pieces.clone(), Algorithm::Milp, guillotine);
        check_layout(&res, &pieces)?;
        if !stock.is_bounded() {
            prop_assert!(res.unplaced.is_empty());
        }
        if guillotine {
            let bounds: Vec<Bounds> = res.placements.iter().map(|p| p.bounds()).collect();
            prop_assert!(is_guillotine(&bounds));
        }

        // Never worse than the shelf heuristic it starts from.
        let shelf = solve(stock, pieces.clone(), Algorithm::Fast, false);
        prop_assert!(res.used_area >= shelf.used_area);
        if res.used_area == shelf.used_area {
            prop_assert!(res.consumed_length <= shelf.consumed_length);
        }
    }
}
