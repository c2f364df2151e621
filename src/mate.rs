// src/mate.rs
// ---------------------------------------------------------------------------
// Extrator de mate: cadeia ordenada de estratégias, para na primeira que acha.
// ---------------------------------------------------------------------------
//  1. Direct     – score cru já é de mate
//  2. SideToMove – reexpressa o score pelo lado que joga
//  3. Textual    – procura "mate <n>" no texto do score
// ---------------------------------------------------------------------------

use lazy_static::lazy_static;
use regex::Regex;
use shakmaty::Color;

use crate::engine::ScoreReport;

lazy_static! {
    static ref MATE_TEXT: Regex = Regex::new(r"mate\s*([+-]?\d+)").unwrap();
}

/// Estratégias na ordem em que são tentadas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MateStrategy { Direct, SideToMove, Textual }

impl MateStrategy {
    pub const CHAIN: [MateStrategy; 3] = [MateStrategy::Direct, MateStrategy::SideToMove, MateStrategy::Textual];

    /// Aplica uma única estratégia
    pub fn apply(self, report: &ScoreReport, turn: Color) -> Option<i32> {
        match self {
            MateStrategy::Direct     => report.relative.and_then(|s| s.mate()),
            MateStrategy::SideToMove => report.pov.and_then(|p| p.pov(turn).mate()),
            MateStrategy::Textual    => report.text.as_deref().and_then(parse_mate_text),
        }
    }
}

/// Distância de mate com sinal: positiva = quem joga dá mate; negativa = quem joga leva mate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MateFound {
    pub distance: i32,
    pub strategy: MateStrategy,
}

impl MateFound {
    /// Número de lances até o mate, independente do sinal
    pub fn moves(&self) -> u32 { self.distance.unsigned_abs() }

    /// Cor que dá o mate, dado o lado que joga na posição analisada
    pub fn winner(&self, turn: Color) -> Color {
        if self.distance > 0 { turn } else { !turn }
    }

    /// Dentro de [1, limite]
    pub fn within(&self, limit: u8) -> bool {
        (1..=u32::from(limit)).contains(&self.moves())
    }
}

/// Percorre a cadeia e devolve o primeiro mate encontrado
pub fn extract_mate(report: &ScoreReport, turn: Color) -> Option<MateFound> {
    MateStrategy::CHAIN
        .iter()
        .find_map(|&strategy| strategy.apply(report, turn).map(|distance| MateFound { distance, strategy }))
}

/// Rede de segurança: ausência de padrão significa "sem mate"
fn parse_mate_text(text: &str) -> Option<i32> {
    MATE_TEXT.captures(text)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PovScore, Score};

    #[test]
    fn direct_wins_when_available() {
        let report = ScoreReport {
            relative: Some(Score::Mate(3)),
            pov:      Some(PovScore { color: Color::White, score: Score::Mate(-9) }),
            text:     Some("score mate 7".into()),
        };
        let m = extract_mate(&report, Color::White).unwrap();
        assert_eq!(m, MateFound { distance: 3, strategy: MateStrategy::Direct });
    }

    #[test]
    fn side_to_move_reexpresses_pov() {
        // reportado pelas brancas, mas quem joga são as pretas
        let report = ScoreReport {
            relative: Some(Score::Cp(12)),
            pov:      Some(PovScore { color: Color::White, score: Score::Mate(2) }),
            text:     None,
        };
        let m = extract_mate(&report, Color::Black).unwrap();
        assert_eq!(m.strategy, MateStrategy::SideToMove);
        assert_eq!(m.distance, -2);
        assert_eq!(m.winner(Color::Black), Color::White);
    }

    #[test]
    fn textual_only_negative_mate() {
        let report = ScoreReport { relative: None, pov: None, text: Some("mate -4".into()) };
        let m = extract_mate(&report, Color::White).unwrap();
        assert_eq!(m.strategy, MateStrategy::Textual);
        assert_eq!(m.moves(), 4);
        assert!(m.distance < 0);
        assert_eq!(m.winner(Color::White), Color::Black);
    }

    #[test]
    fn text_without_mate_is_absent() {
        let report = ScoreReport { relative: Some(Score::Cp(80)), pov: None, text: Some("score cp 80".into()) };
        assert_eq!(extract_mate(&report, Color::White), None);
        assert_eq!(extract_mate(&ScoreReport::default(), Color::White), None);
    }

    #[test]
    fn each_strategy_in_isolation() {
        let report = ScoreReport {
            relative: None,
            pov:      Some(PovScore { color: Color::Black, score: Score::Mate(5) }),
            text:     Some("score mate +6 lowerbound".into()),
        };
        assert_eq!(MateStrategy::Direct.apply(&report, Color::Black), None);
        assert_eq!(MateStrategy::SideToMove.apply(&report, Color::Black), Some(5));
        assert_eq!(MateStrategy::Textual.apply(&report, Color::Black), Some(6));
    }

    #[test]
    fn limit_bounds_are_inclusive() {
        let m = |d| MateFound { distance: d, strategy: MateStrategy::Direct };
        assert!(m(12).within(12));
        assert!(m(-12).within(12));
        assert!(!m(13).within(12));
        assert!(!m(0).within(12));
        assert!(!m(1).within(0));
    }
}
