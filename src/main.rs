use std::path::PathBuf;

use clap::Parser;
use cutting_stock::config::{load_request, save_request};
use cutting_stock::{Algorithm, OptimizeRequest, OptimizeResponse, PieceSpec, Solver, StockSheet};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "cutting_stock",
    about = "2D cutting-stock optimizer for a single sheet or roll"
)]
struct Cli {
    /// Load the request from a JSON file
    #[arg(long, conflicts_with_all = ["stock", "cuts"])]
    config: Option<PathBuf>,

    /// Stock dimensions as WxH, H=0 for an unbounded roll (e.g. 1000x800)
    #[arg(long, required_unless_present = "config")]
    stock: Option<String>,

    /// Pieces as WxH:qty, append :fixed to forbid rotation (e.g. 200x300:2 150x200:3:fixed)
    #[arg(long = "cuts", num_args = 1.., required_unless_present = "config")]
    cuts: Vec<String>,

    /// milp, simple, fast, improved or smart
    #[arg(long)]
    algorithm: Option<String>,

    /// Time limit in seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// Require guillotine cuts (milp only)
    #[arg(long)]
    guillotine: bool,

    /// Disable piece rotation
    #[arg(long)]
    no_rotate: bool,

    /// Print the JSON response instead of a summary
    #[arg(long)]
    json: bool,

    /// Write the request to this file before solving
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Heuristic to retry with if the exact solver fails
    #[arg(long)]
    fallback: Option<String>,

    /// Report material cost at this price per unit area
    #[arg(long)]
    cost_per_area: Option<f64>,

    /// Log solver progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!("invalid dimensions '{}', expected WxH", s));
    }
    let width = parts[0]
        .parse::<u32>()
        .map_err(|_| format!("invalid width in '{}'", s))?;
    let height = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid height in '{}'", s))?;
    Ok((width, height))
}

fn parse_cut(s: &str) -> Result<PieceSpec, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let (dims, qty, fixed) = match parts.as_slice() {
        [dims, qty] => (dims, qty, false),
        [dims, qty, "fixed"] => (dims, qty, true),
        _ => return Err(format!("invalid cut '{}', expected WxH:qty[:fixed]", s)),
    };
    let (width, height) = parse_dimensions(dims)?;
    let qty = qty
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity in '{}'", s))?;
    Ok(if fixed {
        PieceSpec::Rotatable(width as f64, height as f64, qty as f64, false)
    } else {
        PieceSpec::plain(width, height, qty)
    })
}

fn build_request(cli: &Cli) -> Result<OptimizeRequest, String> {
    let mut request = match (&cli.config, &cli.stock) {
        (Some(path), _) => load_request(path).map_err(|e| e.to_string())?,
        (None, Some(stock)) => {
            let (width, height) = parse_dimensions(stock)?;
            let pieces = cli
                .cuts
                .iter()
                .map(|c| parse_cut(c))
                .collect::<Result<Vec<_>, _>>()?;
            OptimizeRequest::new(width, height, pieces)
        }
        (None, None) => return Err("either --config or --stock is required".into()),
    };

    if let Some(algorithm) = &cli.algorithm {
        request.algorithm = algorithm.clone();
    }
    if let Some(limit) = cli.time_limit {
        request.time_limit = limit;
    }
    if cli.guillotine {
        request.guillotine_cut = true;
    }
    if cli.no_rotate {
        request.allow_rotation = false;
    }
    Ok(request)
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let request = build_request(&cli).unwrap_or_else(|e| fail(e));
    if let Some(path) = &cli.save_config {
        save_request(path, &request).unwrap_or_else(|e| fail(e));
    }
    let fallback = cli
        .fallback
        .as_deref()
        .map(str::parse::<Algorithm>)
        .transpose()
        .unwrap_or_else(|e| fail(e));

    let outcome = Solver::from_request(&request).and_then(|solver| match fallback {
        Some(fallback) => solver.solve_with_fallback(fallback),
        None => solver.solve(),
    });

    if cli.json {
        let failed = outcome.is_err();
        let response = match outcome {
            Ok(result) => OptimizeResponse::ok(result),
            Err(e) => OptimizeResponse::failed(request.algorithm.clone(), &e),
        };
        let text = serde_json::to_string_pretty(&response).unwrap_or_else(|e| fail(e));
        println!("{text}");
        if failed {
            std::process::exit(1);
        }
        return;
    }

    let result = outcome.unwrap_or_else(|e| fail(e));

    // Output results
    let stock = StockSheet {
        width: result.stock_width,
        height: result.stock_height,
    };
    println!("Stock {stock}, algorithm {}:", result.algorithm);
    for p in &result.placements {
        let rot = if p.rotated { " [rotated]" } else { "" };
        println!("  {} {}x{} @ ({}, {}){}", p.piece_id, p.width, p.height, p.x, p.y, rot);
    }
    if !result.unplaced.is_empty() {
        println!("Unplaced:");
        for u in &result.unplaced {
            println!("  {} {}x{} ({})", u.piece_id, u.width, u.height, u.reason);
        }
    }
    println!();

    println!(
        "Summary: {} of {} piece{} placed, length {}, {:.1}% waste, {:.3}s{}",
        result.placed_count(),
        result.placed_count() + result.unplaced.len(),
        if result.placed_count() + result.unplaced.len() == 1 { "" } else { "s" },
        result.consumed_length,
        result.waste_percentage,
        result.execution_time,
        if result.is_optimal { ", optimal" } else { "" },
    );

    if let Some(price) = cli.cost_per_area {
        let cost = result.material_cost(price);
        println!(
            "Cost: {:.2} total, {:.2} used, {:.2} wasted ({:.1}% efficient)",
            cost.total_cost, cost.used_cost, cost.waste_cost, cost.cost_efficiency
        );
    }
}
