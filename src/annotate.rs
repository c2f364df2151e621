// src/annotate.rs
// ---------------------------------------------------------------------------
// Anotador da solução: percorre a variante principal numa cópia do tabuleiro
// e marca o lance que dá mate com `#`.
// ---------------------------------------------------------------------------

use shakmaty::{uci::UciMove, Chess, Position};

use crate::config::MATE_MARKER;

/// Motivo de parada do percurso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStop {
    Checkmate,          // a cópia chegou a mate
    Exhausted,          // a variante acabou sem mate
    IllegalMove(usize), // lance não aplicável nesse índice
}

/// Lances percorridos (texto UCI) e índice do mate, se houver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedLine {
    pub moves:      Vec<String>,
    pub mate_index: Option<usize>,
    pub stop:       WalkStop,
}

/// Percorre a variante; nunca falha, uma variante malformada só encurta o percurso
pub fn walk_variation(board: &Chess, pv: &[UciMove]) -> WalkedLine {
    let mut copy = board.clone();
    let mut moves = Vec::with_capacity(pv.len());

    for (idx, uci) in pv.iter().enumerate() {
        // o texto é registrado antes da tentativa de aplicar
        moves.push(uci.to_string());
        let Ok(mv) = uci.to_move(&copy) else {
            return WalkedLine { moves, mate_index: None, stop: WalkStop::IllegalMove(idx) };
        };
        copy.play_unchecked(&mv);
        if copy.is_checkmate() {
            return WalkedLine { moves, mate_index: Some(idx), stop: WalkStop::Checkmate };
        }
    }
    WalkedLine { moves, mate_index: None, stop: WalkStop::Exhausted }
}

/// Regras de marcação, tentadas em ordem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRule {
    MatingMove, // índice do mate confirmado
    LastMove,   // fallback: último lance registrado (mate não confirmado)
}

impl MarkerRule {
    pub const CHAIN: [MarkerRule; 2] = [MarkerRule::MatingMove, MarkerRule::LastMove];

    fn index(self, walk: &WalkedLine) -> Option<usize> {
        match self {
            MarkerRule::MatingMove => walk.mate_index,
            MarkerRule::LastMove   => walk.moves.len().checked_sub(1),
        }
    }
}

/// Solução anotada: exatamente um lance carrega o marcador
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedSolution {
    pub moves: Vec<String>,
    pub rule:  MarkerRule,
}

impl AnnotatedSolution {
    /// Mate confirmado no tabuleiro
    pub fn confirmed(&self) -> bool { self.rule == MarkerRule::MatingMove }
}

/// Anexa o marcador conforme a primeira regra aplicável; `None` para variante vazia
pub fn annotate(walk: &WalkedLine) -> Option<AnnotatedSolution> {
    let (rule, idx) = MarkerRule::CHAIN.iter().find_map(|&r| r.index(walk).map(|i| (r, i)))?;
    let mut moves = walk.moves.clone();
    moves[idx].push(MATE_MARKER);
    Some(AnnotatedSolution { moves, rule })
}
