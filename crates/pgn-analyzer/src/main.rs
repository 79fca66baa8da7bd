//! PGN Analyzer - evaluates recorded games with a UCI engine.
//!
//! Reads a PGN file, converts each game's SAN moves to the LAN form engines
//! consume, and asks an engine from the configured registry for an
//! evaluation of the final position (or of every position with
//! `--per-move`). Results are printed as a table or as JSON.

mod config;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;

use chess_notation::{parse_games, PgnGame, SanConverter};
use config::AnalyzerConfig;
use uci_driver::{EnginePool, Evaluation, SearchLimit, UciSession};

/// PGN Analyzer - evaluates recorded games with a UCI engine.
#[derive(Parser)]
#[command(name = "pgn-analyzer")]
#[command(about = "Evaluates PGN games with a UCI engine")]
struct Args {
    /// PGN file to analyze
    pgn: PathBuf,

    /// Path to the engine registry config
    #[arg(long, default_value = "engines.toml")]
    config: PathBuf,

    /// Engine name from the registry
    #[arg(long, default_value = "stockfish")]
    engine: String,

    /// Search depth per evaluated position
    #[arg(long, default_value = "12")]
    depth: u32,

    /// Number of principal variations to collect
    #[arg(long, default_value = "1")]
    multipv: u32,

    /// Evaluate after every move instead of only the final position
    #[arg(long)]
    per_move: bool,

    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Also write the JSON report to a file
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Evaluation of one position within a game.
#[derive(Debug, Serialize)]
struct PositionReport {
    /// Half-moves played before this position.
    ply: usize,
    /// The move (LAN) that led here, absent for the final-position-only mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    last_move: Option<String>,
    /// Ranked evaluations, best line first.
    evaluations: Vec<Evaluation>,
}

/// One analyzed game.
#[derive(Debug, Serialize)]
struct GameReport {
    white: String,
    black: String,
    result: String,
    moves: Vec<String>,
    positions: Vec<PositionReport>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = AnalyzerConfig::load(&args.config)
        .with_context(|| format!("loading config from {:?}", args.config))?;
    if !config.engines.contains_key(&args.engine) {
        bail!(
            "engine {:?} is not declared in {:?} (known: {:?})",
            args.engine,
            args.config,
            config.engines.keys().collect::<Vec<_>>()
        );
    }

    let pool = EnginePool::new(config.pool_capacity);
    for (name, entry) in &config.engines {
        pool.register_process(name.clone(), entry.definition());
    }

    let text = std::fs::read_to_string(&args.pgn)
        .with_context(|| format!("reading PGN from {:?}", args.pgn))?;
    let games = parse_games(&text);
    if games.is_empty() {
        bail!("no games found in {:?}", args.pgn);
    }
    tracing::info!(games = games.len(), "parsed PGN input");

    let session = pool
        .checkout(&args.engine)
        .await
        .with_context(|| format!("checking out engine {:?}", args.engine))?;
    if let Some(name) = session.identity().name {
        tracing::info!(engine = name, "engine ready");
    }
    if args.multipv > 1 {
        session.set_multi_pv(args.multipv).await?;
    }

    let mut converter = SanConverter::new();
    let mut reports = Vec::new();
    for (index, game) in games.iter().enumerate() {
        match analyze_game(&session, &mut converter, game, &args).await {
            Ok(report) => reports.push(report),
            Err(err) => {
                tracing::warn!(game = index + 1, error = %err, "skipping game");
            }
        }
    }

    session.dispose().await;
    pool.close();

    if reports.is_empty() {
        bail!("no game could be analyzed");
    }
    if let Some(path) = &args.out {
        std::fs::write(path, serde_json::to_string_pretty(&reports)?)
            .with_context(|| format!("writing report to {:?}", path))?;
        tracing::info!(path = ?path, "report written");
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }
    Ok(())
}

/// Converts one game to LAN and collects its evaluations.
async fn analyze_game(
    session: &UciSession,
    converter: &mut SanConverter,
    game: &PgnGame,
    args: &Args,
) -> anyhow::Result<GameReport> {
    converter.reset();
    let lan_moves = converter
        .convert_all(game.moves.iter().map(String::as_str))
        .context("converting SAN moves")?;

    session.new_game().await?;
    session.wait_ready().await?;

    let limit = SearchLimit::Depth(args.depth);
    let mut positions = Vec::new();
    if args.per_move {
        for ply in 1..=lan_moves.len() {
            session.set_position(None, &lan_moves[..ply]).await?;
            let collection = session.evaluate(limit).await?;
            positions.push(PositionReport {
                ply,
                last_move: Some(lan_moves[ply - 1].clone()),
                evaluations: collection.evaluations().to_vec(),
            });
        }
    } else {
        session.set_position(None, &lan_moves).await?;
        let collection = session.evaluate(limit).await?;
        positions.push(PositionReport {
            ply: lan_moves.len(),
            last_move: None,
            evaluations: collection.evaluations().to_vec(),
        });
    }

    Ok(GameReport {
        white: game.header("White").unwrap_or("?").to_string(),
        black: game.header("Black").unwrap_or("?").to_string(),
        result: game.result.clone(),
        moves: lan_moves,
        positions,
    })
}

fn print_report(report: &GameReport) {
    println!(
        "{} vs {}  {}  ({} moves)",
        report.white,
        report.black,
        report.result,
        report.moves.len()
    );
    for position in &report.positions {
        let label = match &position.last_move {
            Some(mv) => format!("ply {:>3} ({})", position.ply, mv),
            None => format!("ply {:>3} (final)", position.ply),
        };
        let lines: Vec<String> = position
            .evaluations
            .iter()
            .map(|eval| format!("#{} {} @d{}", eval.rank, eval.score, eval.depth))
            .collect();
        println!("  {}  {}", label, lines.join("  "));
    }
    println!();
}
