// src/puzzle.rs
// ---------------------------------------------------------------------------
// Construtor de puzzles: relê linhas anotadas (sol/theme), revalida os lances,
// decide o vencedor e, opcionalmente, faz o vencedor jogar primeiro.
// ---------------------------------------------------------------------------

use anyhow::{bail, Context, Result};
use log::{debug, trace};
use shakmaty::{fen::Fen, san::San, uci::UciMove, Chess, Color, EnPassantMode, Move, Position};

use crate::{
    catalog::{write_catalog, PuzzleEntry},
    config::PuzzleConfig,
    epd::{fen_of, parse_operands, theme_mate, PositionRecord, SOL_OPERAND, THEME_OPERAND},
    error::MoveError,
    progress::{CancelFlag, EtaTracker, EventSink, RunState},
    utils::{count_lines, lossy_lines},
};

/// Resultado de uma passada do construtor
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    pub puzzles:   Vec<PuzzleEntry>,
    pub total:     u64,
    pub processed: u64,
    pub kept:      u64,
    pub cancelled: bool,
}

/// Converte um token (UCI ou SAN) em lance legal; marcadores finais (#, +, !, ?) são ignorados
pub fn parse_token(board: &Chess, token: &str) -> Result<Move, MoveError> {
    let bare = token.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    if bare.is_empty() { return Err(MoveError::Unparsable(token.into())); }

    if let Ok(uci) = bare.parse::<UciMove>() {
        return uci.to_move(board).map_err(|_| MoveError::Illegal(token.into()));
    }
    if let Ok(san) = bare.parse::<San>() {
        return san.to_move(board).map_err(|_| MoveError::Illegal(token.into()));
    }
    Err(MoveError::Unparsable(token.into()))
}

/// Replay dos tokens sobre a posição de partida
#[derive(Debug, Clone)]
pub struct Replay {
    pub applied: Vec<(String, Move)>,      // token original (com marcador) + lance aplicado
    pub skipped: Vec<(usize, MoveError)>,  // índice do token descartado + causa
    pub board:   Chess,                    // posição após o último lance aplicado
}

impl Replay {
    pub fn run(start: &Chess, tokens: &[String]) -> Self {
        let mut board = start.clone();
        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        for (idx, tok) in tokens.iter().enumerate() {
            match parse_token(&board, tok) {
                Ok(mv) => {
                    board.play_unchecked(&mv);
                    applied.push((tok.clone(), mv));
                }
                Err(e) => skipped.push((idx, e)),
            }
        }
        Replay { applied, skipped, board }
    }

    /// Replay terminou em mate com pelo menos um lance validado
    pub fn mated(&self) -> bool {
        !self.applied.is_empty() && self.board.is_checkmate()
    }
}

/// Regras de decisão do vencedor, tentadas em ordem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerRule {
    Checkmate,  // quem não joga na posição final de mate
    EngineSign, // sinal da distância reportada pelo engine, quando conhecido
    MateParity, // heurística: distância ímpar ⇒ quem joga vence
}

impl WinnerRule {
    pub const CHAIN: [WinnerRule; 3] = [WinnerRule::Checkmate, WinnerRule::EngineSign, WinnerRule::MateParity];

    fn apply(self, start_turn: Color, replay: &Replay, mate: u32, known: Option<Color>) -> Option<Color> {
        match self {
            WinnerRule::Checkmate  => replay.mated().then(|| !replay.board.turn()),
            WinnerRule::EngineSign => known,
            WinnerRule::MateParity => Some(if mate % 2 == 1 { start_turn } else { !start_turn }),
        }
    }
}

/// Primeira regra que decide o vencedor; `known` vem do sinal do mate quando há análise
pub fn decide_winner(start_turn: Color, replay: &Replay, mate: u32, known: Option<Color>) -> (Color, WinnerRule) {
    WinnerRule::CHAIN
        .iter()
        .find_map(|&r| r.apply(start_turn, replay, mate, known).map(|c| (c, r)))
        .unwrap_or((start_turn, WinnerRule::MateParity))
}

/// FEN da posição com o lado a jogar forçado
fn fen_with_turn(board: Chess, turn: Color) -> String {
    let mut setup = board.into_setup(EnPassantMode::Legal);
    if setup.turn != turn {
        setup.turn = turn;
        setup.ep_square = None;
    }
    Fen::from_setup(setup).to_string()
}

/// Monta o puzzle a partir da posição e dos tokens da solução.
///
/// Tokens inválidos são descartados (logados) sem abortar a entrada; se nenhum
/// validar, os tokens originais são mantidos para que a solução nunca fique vazia.
/// Com `fix_move_order`, quando quem joga não é o vencedor, o primeiro lance é
/// embutido na posição e o lado a jogar passa a ser o vencedor.
/// `known_winner` é o lado que dá mate segundo o engine (ausente ao reler EPD anotado).
pub fn entry_from_solution(
    start:          &Chess,
    tokens:         &[String],
    mate:           u32,
    known_winner:   Option<Color>,
    fix_move_order: bool,
    lineno:         u64,
    events:         &EventSink,
) -> Option<PuzzleEntry> {
    if tokens.is_empty() {
        events.warn(format!("Linha {lineno}: solução vazia, ignorada"));
        return None;
    }

    let replay = Replay::run(start, tokens);
    for (idx, err) in &replay.skipped {
        events.warn(format!("Linha {lineno}: lance {} descartado ({err})", idx + 1));
    }

    let (winner, rule) = decide_winner(start.turn(), &replay, mate, known_winner);
    trace!("linha {lineno}: vencedor {winner:?} por {rule:?}");

    let mut solution: Vec<String> = if replay.applied.is_empty() {
        events.warn(format!("Linha {lineno}: nenhum lance validado, mantendo tokens originais"));
        tokens.to_vec()
    } else {
        replay.applied.iter().map(|(tok, _)| tok.clone()).collect()
    };

    let fen = if fix_move_order && start.turn() != winner {
        let snapshot = match replay.applied.first() {
            Some((_, first)) => {
                let mut b = start.clone();
                b.play_unchecked(first);
                solution.remove(0);
                b
            }
            None => start.clone(),
        };
        if solution.is_empty() {
            events.warn(format!("Linha {lineno}: solução ficou vazia após ajustar a ordem, ignorada"));
            return None;
        }
        fen_with_turn(snapshot, winner)
    } else {
        fen_of(start)
    };

    Some(PuzzleEntry::new(fen, solution, mate))
}

/// Segunda pipeline: linhas anotadas → puzzles
#[derive(Debug, Clone, Copy)]
pub struct PuzzleBuilder { fix_move_order: bool }

impl PuzzleBuilder {
    pub fn new(fix_move_order: bool) -> Self { Self { fix_move_order } }

    /// Processa todas as linhas; `total` alimenta o progresso (contagem prévia)
    pub fn build<I, S>(&self, lines: I, total: u64, events: &EventSink, cancel: &CancelFlag) -> BuildOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let eta = EtaTracker::new(total);
        let mut out = BuildOutcome { total, ..BuildOutcome::default() };

        for line in lines {
            if cancel.is_cancelled() {
                events.info("Construção de puzzles cancelada pelo usuário.");
                out.cancelled = true;
                break;
            }
            out.processed += 1;
            let line = line.as_ref();
            if !line.trim().is_empty() {
                if let Some(entry) = self.process_line(out.processed, line, events) {
                    out.puzzles.push(entry);
                    out.kept += 1;
                }
            }
            events.progress(eta.snapshot(out.processed, out.kept));
        }

        events.progress(eta.final_snapshot(out.processed, out.kept));
        out
    }

    fn process_line(&self, lineno: u64, line: &str, events: &EventSink) -> Option<PuzzleEntry> {
        let ops = parse_operands(line);
        let Some(sol) = ops.get(SOL_OPERAND) else {
            debug!("linha {lineno}: sem operando {SOL_OPERAND}");
            return None;
        };
        let tokens: Vec<String> = sol.split_whitespace().map(String::from).collect();

        let rec = match PositionRecord::parse_annotated(line) {
            Ok(r) => r,
            Err(e) => {
                events.warn(format!("Pulando FEN inválido na linha {lineno}: {e}"));
                return None;
            }
        };

        let mate = ops
            .get(THEME_OPERAND)
            .and_then(|t| theme_mate(t))
            .filter(|&m| m > 0)
            .unwrap_or(tokens.len() as u32);

        entry_from_solution(&rec.board, &tokens, mate, None, self.fix_move_order, lineno, events)
    }
}

/// Pipeline completa: conta, lê em streaming, constrói e grava o catálogo (parcial se cancelado)
pub fn run_puzzles(cfg: &PuzzleConfig, events: &EventSink, cancel: &CancelFlag) -> Result<BuildOutcome> {
    let result = build_and_write(cfg, events, cancel);
    match &result {
        Ok(out) if out.cancelled => events.finished(RunState::Cancelled),
        Ok(_)                    => events.finished(RunState::Completed),
        Err(e) => {
            events.log(log::Level::Error, format!("Erro fatal: {e:#}"));
            events.finished(RunState::Failed(format!("{e:#}")));
        }
    }
    result
}

fn build_and_write(cfg: &PuzzleConfig, events: &EventSink, cancel: &CancelFlag) -> Result<BuildOutcome> {
    if !cfg.input.exists() {
        bail!("Arquivo de entrada não encontrado: {}", cfg.input.display());
    }
    let total = count_lines(&cfg.input).with_context(|| format!("contar linhas de {}", cfg.input.display()))?;
    if total == 0 {
        bail!("Arquivo de entrada vazio: {}", cfg.input.display());
    }
    events.info(format!("Total de linhas anotadas: {total}"));

    let mut read_err = None;
    let lines = lossy_lines(&cfg.input)
        .with_context(|| format!("abrir {}", cfg.input.display()))?
        .map_while(|r| match r {
            Ok(line) => Some(line),
            Err(e) => {
                read_err = Some(e);
                None
            }
        });
    let mut out = PuzzleBuilder::new(cfg.fix_move_order).build(lines, total, events, cancel);
    if let Some(e) = read_err {
        return Err(e).with_context(|| format!("ler {}", cfg.input.display()));
    }

    let written = write_catalog(&cfg.catalog, std::mem::take(&mut out.puzzles))?;
    events.info(format!("Catálogo JSON com {written} puzzles salvo em {}", cfg.catalog.display()));
    Ok(out)
}
