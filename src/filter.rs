// src/filter.rs
// ---------------------------------------------------------------------------
// Pipeline de filtragem: contagem  ·  análise linha a linha  ·  limpeza final
// ---------------------------------------------------------------------------
//  Idle → Counting → Streaming → (Cancelled | Completed | Failed)
//  O engine é encerrado em todo caminho de saída de Streaming.
// ---------------------------------------------------------------------------

use std::{
    future::Future,
    io,
    path::PathBuf,
    time::{Duration, Instant},
};

use log::{debug, trace};
use shakmaty::Position;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter},
};

use crate::{
    annotate::{annotate, walk_variation},
    catalog::{write_catalog, PuzzleEntry},
    config::FilterConfig,
    engine::{EngineSession, UciEngine},
    epd::{annotate_line, PositionRecord},
    error::{EngineError, PipelineError},
    mate::extract_mate,
    progress::{CancelFlag, EtaTracker, EventSink, RunState},
    puzzle::entry_from_solution,
    utils::{count_lines, decode_line, ensure_parent_dir, format_duration},
};

/// Estados do pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState { Idle, Counting, Streaming, Cancelled, Completed, Failed }

impl FilterState {
    fn advance(&mut self, next: FilterState) {
        debug!("filtro: {:?} → {:?}", self, next);
        *self = next;
    }
}

/// Resumo de uma execução concluída ou cancelada
#[derive(Debug, Clone)]
pub struct FilterReport {
    pub state:            FilterState,
    pub processed:        u64,
    pub total:            u64,
    pub kept:             u64,
    pub puzzles_exported: Option<usize>,
    pub elapsed:          Duration,
}

/// Contagem acumulada durante o streaming
#[derive(Debug, Default)]
struct Tally {
    processed: u64,
    kept:      u64,
    cancelled: bool,
    puzzles:   Vec<PuzzleEntry>,
}

/// Linha aprovada: texto de saída + puzzle opcional
struct KeptLine {
    text:  String,
    entry: Option<PuzzleEntry>,
}

/// Executa o filtro com o engine UCI configurado
pub async fn run_filter(cfg: &FilterConfig, events: &EventSink, cancel: &CancelFlag) -> Result<FilterReport, PipelineError> {
    let engine_cfg = cfg.engine.clone();
    run_filter_with(cfg, events, cancel, move || async move { UciEngine::open(&engine_cfg).await }).await
}

/// Executa o filtro com qualquer implementação da fronteira de engine
pub async fn run_filter_with<E, F, Fut>(
    cfg:    &FilterConfig,
    events: &EventSink,
    cancel: &CancelFlag,
    open:   F,
) -> Result<FilterReport, PipelineError>
where
    E:   EngineSession,
    F:   FnOnce() -> Fut,
    Fut: Future<Output = Result<E, EngineError>>,
{
    let started = Instant::now();
    let mut state = FilterState::Idle;
    cfg.validate().map_err(|e| fail(events, e.into()))?;

    // 1. Contagem
    state.advance(FilterState::Counting);
    if !cfg.input.exists() {
        return Err(fail(events, PipelineError::MissingInput(cfg.input.clone())));
    }
    let input = cfg.input.clone();
    let total = tokio::task::spawn_blocking(move || count_lines(&input))
        .await
        .map_err(io::Error::other)
        .and_then(|counted| counted)
        .map_err(|e| fail(events, e.into()))?;
    if total == 0 {
        events.warn("Arquivo de entrada vazio.");
        return Err(fail(events, PipelineError::EmptyInput(cfg.input.clone())));
    }
    events.info(format!("Total de posições: {total}"));

    // 2. Engine
    events.info(format!(
        "Iniciando engine: {} (depth={}, threads={})",
        cfg.engine.executable_path.display(), cfg.engine.depth, cfg.engine.threads
    ));
    let mut engine = open().await.map_err(|e| fail(events, e.into()))?;
    if let Err(e) = engine.configure_threads(cfg.engine.threads).await {
        events.warn(format!("Threads não aplicado: {e}"));
    }

    // 3. Streaming; o engine é encerrado qualquer que seja o resultado
    state.advance(FilterState::Streaming);
    let eta = EtaTracker::new(total);
    let mut tally = Tally::default();
    let streamed = stream(&mut engine, cfg, events, cancel, &eta, &mut tally).await;
    engine.shutdown().await;

    if let Err(e) = streamed {
        state.advance(FilterState::Failed);
        events.progress(eta.final_snapshot(tally.processed, tally.kept));
        return Err(fail(events, e));
    }

    // 4. Catálogo opcional (falha não é fatal)
    let puzzles_exported = match &cfg.catalog {
        Some(path) => match export_catalog(path.clone(), std::mem::take(&mut tally.puzzles)).await {
            Ok(n) => {
                events.info(format!("Catálogo JSON com {n} puzzles salvo em {}", path.display()));
                Some(n)
            }
            Err(e) => {
                events.warn(format!("Falha ao gravar catálogo JSON: {e:#}"));
                None
            }
        },
        None => None,
    };

    state.advance(if tally.cancelled { FilterState::Cancelled } else { FilterState::Completed });
    let elapsed = started.elapsed();
    events.info(format!(
        "Finalizado. Processadas {}/{total}, mantidas {}. Tempo: {}",
        tally.processed, tally.kept, format_duration(elapsed)
    ));
    events.progress(eta.final_snapshot(tally.processed, tally.kept));
    events.finished(if tally.cancelled { RunState::Cancelled } else { RunState::Completed });

    Ok(FilterReport { state, processed: tally.processed, total, kept: tally.kept, puzzles_exported, elapsed })
}

/// Grava o catálogo fora das threads do runtime
async fn export_catalog(path: PathBuf, puzzles: Vec<PuzzleEntry>) -> anyhow::Result<usize> {
    tokio::task::spawn_blocking(move || write_catalog(&path, puzzles)).await?
}

/// Loga o erro fatal e emite a conclusão antes de propagar
fn fail(events: &EventSink, err: PipelineError) -> PipelineError {
    events.log(log::Level::Error, format!("Erro fatal: {err}"));
    events.finished(RunState::Failed(err.to_string()));
    err
}

/// Segunda passada: analisa e grava as linhas aprovadas
async fn stream<E: EngineSession>(
    engine: &mut E,
    cfg:    &FilterConfig,
    events: &EventSink,
    cancel: &CancelFlag,
    eta:    &EtaTracker,
    tally:  &mut Tally,
) -> Result<(), PipelineError> {
    ensure_parent_dir(&cfg.output)?;
    let mut out = BufWriter::new(File::create(&cfg.output).await?);
    let mut rdr = BufReader::new(File::open(&cfg.input).await?);
    let mut raw = Vec::new();

    loop {
        if cancel.is_cancelled() {
            events.info("Análise cancelada pelo usuário.");
            tally.cancelled = true;
            break;
        }
        raw.clear();
        if rdr.read_until(b'\n', &mut raw).await? == 0 { break; }
        tally.processed += 1;

        let line = decode_line(&raw);
        if let Some(kept) = process_line(engine, cfg, events, tally.processed, &line).await {
            out.write_all(kept.text.as_bytes()).await?;
            out.write_all(b"\n").await?;
            tally.kept += 1;
            tally.puzzles.extend(kept.entry);
        }
        events.progress(eta.snapshot(tally.processed, tally.kept));
    }

    out.flush().await?;
    Ok(())
}

/// Uma linha: posição → análise → mate → anotação. Erros locais viram log + skip.
async fn process_line<E: EngineSession>(
    engine: &mut E,
    cfg:    &FilterConfig,
    events: &EventSink,
    lineno: u64,
    line:   &str,
) -> Option<KeptLine> {
    if line.trim().is_empty() { return None; }

    let rec = match PositionRecord::parse(line) {
        Ok(r) => r,
        Err(e) => {
            events.warn(format!("Pulando FEN inválido na linha {lineno}: {e}"));
            return None;
        }
    };

    let analysis = match engine.analyze(&rec.board, cfg.engine.depth).await {
        Ok(a) => a,
        Err(e) => {
            events.warn(format!("Erro do engine na linha {lineno}: {e}"));
            return None;
        }
    };

    let mate = extract_mate(&analysis.score, rec.board.turn())?;
    trace!("linha {lineno}: mate {} via {:?}", mate.distance, mate.strategy);
    if !mate.within(cfg.mate_limit) { return None; }
    let moves_to_mate = mate.moves();

    let walk = walk_variation(&rec.board, &analysis.pv);
    let solution = annotate(&walk);
    if let Some(sol) = solution.as_ref().filter(|s| !s.confirmed()) {
        events.warn(format!(
            "Linha {lineno}: variante não confirma o mate ({:?}); marcador no último lance {}",
            walk.stop,
            sol.moves.last().map(String::as_str).unwrap_or_default()
        ));
    }

    let text = match (&solution, cfg.add_solution) {
        (Some(sol), true) => {
            events.info(format!(
                "Solução adicionada ({} lances) na linha {lineno}: {}",
                sol.moves.len(), sol.moves.join(" ")
            ));
            annotate_line(&rec.line, &sol.moves, moves_to_mate)
        }
        _ => rec.line.clone(),
    };
    events.info(format!("Linha {lineno} mantida: mate em {moves_to_mate}"));

    let winner = mate.winner(rec.board.turn());
    let entry = match (&cfg.catalog, &solution) {
        (Some(_), Some(sol)) => {
            entry_from_solution(&rec.board, &sol.moves, moves_to_mate, Some(winner), cfg.fix_move_order, lineno, events)
        }
        _ => None,
    };
    Some(KeptLine { text, entry })
}
