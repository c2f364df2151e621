// src/main.rs
// ---------------------------------------------------------------------------
// CLI: filtra EPD por mates curtos e constrói catálogos de puzzles.
// ---------------------------------------------------------------------------

use std::{io::Write, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

mod annotate;
mod catalog;
mod config;
mod engine;
mod epd;
mod error;
mod filter;
mod mate;
mod progress;
mod puzzle;
mod utils;
mod visual;

use config::{sibling_path, EngineConfig, FilterConfig, PuzzleConfig, CATALOG_SUFFIX, FILTERED_SUFFIX};
use progress::{CancelFlag, EventSink, RunState};

/// Args CLI - Argumentos da linha de comando para configuração
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,                                    // Nível de logging
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mantém apenas posições com mate forçado curto
    Filter {
        input: PathBuf,                                       // EPD de entrada
        #[arg(short, long)]
        output: Option<PathBuf>,                              // Padrão: <stem>_mates.epd
        #[arg(short, long)]
        engine: PathBuf,                                      // Executável UCI
        #[arg(long = "engine-arg", allow_hyphen_values = true)]
        engine_args: Vec<String>,
        #[arg(short, long, default_value_t = config::DEFAULT_DEPTH,
              value_parser = clap::value_parser!(u8).range(1..=config::MAX_DEPTH as i64))]
        depth: u8,
        #[arg(short, long, default_value_t = config::DEFAULT_THREADS,
              value_parser = clap::value_parser!(u16).range(1..=config::MAX_THREADS as i64))]
        threads: u16,
        #[arg(short, long, default_value_t = config::DEFAULT_MATE_LIMIT,
              value_parser = clap::value_parser!(u8).range(0..=config::MAX_MATE_LIMIT as i64))]
        mate_limit: u8,
        #[arg(long)]
        solution: bool,                                       // Anexa sol/theme
        #[arg(long)]
        json: Option<PathBuf>,                                // Catálogo JSON junto com o filtro
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        fix_move_order: bool,
    },
    /// Constrói o catálogo JSON a partir de um EPD anotado
    Puzzles {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,                              // Padrão: <stem>_mates.json
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        fix_move_order: bool,
    },
}

/// Configura o logger com horário local
fn setup_logger(level: &str) {
    env_logger::Builder::new()
        .filter_level(level.parse().unwrap_or(log::LevelFilter::Info))
        .format(|buf, record| {
            writeln!(buf, "{} [{}] {}", chrono::Local::now().format("%H:%M:%S"), record.level(), record.args())
        })
        .init();
}

/// Ctrl‑C pede cancelamento cooperativo
fn watch_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C recebido, cancelando...");
            cancel.cancel();
        }
    });
}

/// Ponto de entrada principal do programa
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(&args.log_level);

    let cancel = CancelFlag::new();
    watch_ctrl_c(cancel.clone());
    let (events, rx) = EventSink::channel();
    let started = Instant::now();

    let state = match args.command {
        Command::Filter {
            input, output, engine, engine_args, depth, threads, mate_limit, solution, json, fix_move_order,
        } => {
            let output = output.unwrap_or_else(|| sibling_path(&input, FILTERED_SUFFIX));
            let mut engine = EngineConfig::new(engine);
            engine.args = engine_args;
            engine.depth = depth;
            engine.threads = threads;
            let cfg = FilterConfig {
                input, output, engine, mate_limit, add_solution: solution, catalog: json, fix_move_order,
            };

            visual::print_main_header("Filtro de mates");
            visual::print_engine_info(&cfg.engine.executable_path, depth, threads, mate_limit);
            let target = cfg.output.clone();

            let worker = tokio::spawn(async move { filter::run_filter(&cfg, &events, &cancel).await });
            let state = visual::drain_events(rx).await;
            match worker.await.context("worker do filtro abortou")? {
                Ok(report) => visual::render_end_statistics(
                    "filtragem", report.processed, report.total, report.kept, report.elapsed, &target,
                ),
                Err(e) => error!("filtro: {e}"),
            }
            state
        }
        Command::Puzzles { input, output, fix_move_order } => {
            let catalog = output.unwrap_or_else(|| sibling_path(&input, CATALOG_SUFFIX));
            let cfg = PuzzleConfig { input, catalog, fix_move_order };

            visual::print_main_header("Construtor de puzzles");
            let target = cfg.catalog.clone();
            let worker = tokio::task::spawn_blocking(move || puzzle::run_puzzles(&cfg, &events, &cancel));
            let state = visual::drain_events(rx).await;
            match worker.await.context("worker de puzzles abortou")? {
                Ok(out) => visual::render_end_statistics(
                    "puzzles", out.processed, out.total, out.kept, started.elapsed(), &target,
                ),
                Err(e) => error!("puzzles: {e:#}"),
            }
            state
        }
    };

    match state {
        Some(RunState::Completed) => {
            visual::print_success("Concluído.");
            Ok(())
        }
        Some(RunState::Cancelled) => {
            visual::print_success("Cancelado; saída parcial preservada.");
            Ok(())
        }
        Some(RunState::Failed(msg)) => {
            visual::print_error(&msg);
            anyhow::bail!("execução falhou: {msg}")
        }
        None => anyhow::bail!("worker terminou sem estado final"),
    }
}
