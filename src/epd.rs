// src/epd.rs
// ---------------------------------------------------------------------------
// Registro de posição: uma linha EPD/FEN → posição canônica + operandos.
// ---------------------------------------------------------------------------
//  * posição:   até 6 campos iniciais separados por espaço
//  * operandos: segmentos `chave valor;` após o primeiro `;`
//  * saída:     linha original + ` ; sol "..."; ; theme "mate N";`
// ---------------------------------------------------------------------------

use indexmap::IndexMap;
use shakmaty::{fen::Fen, CastlingMode, Chess, EnPassantMode};

use crate::error::PositionError;

/// Número máximo de campos que compõem a posição
const POSITION_FIELDS: usize = 6;

/// Operando com os lances da solução
pub const SOL_OPERAND: &str = "sol";
/// Operando com a distância de mate
pub const THEME_OPERAND: &str = "theme";

/// Linha de entrada já validada como posição
#[derive(Debug, Clone)]
pub struct PositionRecord {
    pub board: Chess,   // Posição canônica
    pub line:  String,  // Texto original (sem quebra de linha)
}

impl PositionRecord {
    /// Valida os primeiros campos da linha; o restante é preservado em `line`
    pub fn parse(line: &str) -> Result<Self, PositionError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let board = parse_position(&position_text(line))?;
        Ok(Self { board, line: line.to_string() })
    }

    /// Variante ciente de operandos: a posição é o trecho antes do primeiro `;`
    pub fn parse_annotated(line: &str) -> Result<Self, PositionError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let base = line.split(';').next().unwrap_or_default();
        let board = parse_position(&position_text(base))?;
        Ok(Self { board, line: line.to_string() })
    }

    /// Operandos anexados após a posição, em ordem de aparição
    pub fn operands(&self) -> IndexMap<String, String> {
        parse_operands(&self.line)
    }
}

/// Junta os até 6 primeiros campos (linhas curtas são usadas inteiras)
pub fn position_text(line: &str) -> String {
    line.split_whitespace().take(POSITION_FIELDS).collect::<Vec<_>>().join(" ")
}

/// Converte texto FEN em posição; codificações inválidas são rejeitadas
pub fn parse_position(text: &str) -> Result<Chess, PositionError> {
    let text = text.trim();
    if text.is_empty() { return Err(PositionError::Empty); }
    let fen: Fen = text.parse()?;
    fen.into_position(CastlingMode::Standard)
        .map_err(|e| PositionError::Illegal(e.to_string()))
}

/// FEN canônico da posição
pub fn fen_of(board: &Chess) -> String {
    Fen::from_position(board.clone(), EnPassantMode::Legal).to_string()
}

/// Extrai operandos `chave valor` de cada segmento após o primeiro `;`.
/// Aspas externas do valor são removidas; chaves repetidas mantêm o primeiro valor.
pub fn parse_operands(line: &str) -> IndexMap<String, String> {
    let mut ops = IndexMap::new();
    for seg in line.split(';').skip(1) {
        let seg = seg.trim();
        if seg.is_empty() { continue; }
        let (key, value) = match seg.split_once(char::is_whitespace) {
            Some((k, v)) => (k, v.trim()),
            None         => (seg, ""),
        };
        let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
        ops.entry(key.to_string()).or_insert_with(|| value.to_string());
    }
    ops
}

/// Distância embutida em `theme "mate N"`
pub fn theme_mate(theme: &str) -> Option<u32> {
    let mut parts = theme.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("mate"), Some(n)) => n.parse().ok(),
        _                       => None,
    }
}

/// Anexa os operandos de solução à linha original (nunca substitui conteúdo)
pub fn annotate_line(line: &str, moves: &[String], mate_moves: u32) -> String {
    let line = line.trim_end_matches(['\r', '\n']);
    format!(
        "{line} ; {SOL_OPERAND} \"{}\"; ; {THEME_OPERAND} \"mate {mate_moves}\";",
        moves.join(" ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{Color, Position};

    const KP: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";

    #[test]
    fn parses_plain_fen_line() {
        let rec = PositionRecord::parse(&format!("{KP}\n")).unwrap();
        assert_eq!(rec.board.turn(), Color::White);
        assert_eq!(rec.line, KP);
        assert_eq!(fen_of(&rec.board), KP);
    }

    #[test]
    fn trailing_content_is_preserved() {
        let line = format!("{KP} ; id \"kp\";");
        let rec = PositionRecord::parse(&line).unwrap();
        assert_eq!(rec.line, line);
        assert_eq!(rec.operands().get("id").map(String::as_str), Some("kp"));
    }

    #[test]
    fn short_line_uses_every_field() {
        // 4 campos ainda formam um FEN aceito pelo parser
        let rec = PositionRecord::parse("8/8/8/8/8/5k2/8/5K1q w - -").unwrap();
        assert_eq!(rec.board.turn(), Color::White);
    }

    #[test]
    fn rejects_invalid_encodings() {
        assert!(matches!(PositionRecord::parse("   "), Err(PositionError::Empty)));
        assert!(matches!(PositionRecord::parse("not a fen at all x y"), Err(PositionError::Fen(_))));
        // dois reis brancos: FEN sintaticamente válido, posição ilegal
        assert!(matches!(
            PositionRecord::parse("8/8/8/8/8/8/8/KK5k w - - 0 1"),
            Err(PositionError::Illegal(_))
        ));
    }

    #[test]
    fn annotated_line_round_trips_operands() {
        let line = annotate_line(KP, &["d1h5".into(), "b8c6".into(), "h5f7#".into()], 2);
        assert_eq!(line, format!("{KP} ; sol \"d1h5 b8c6 h5f7#\"; ; theme \"mate 2\";"));

        let rec = PositionRecord::parse_annotated(&line).unwrap();
        let ops = rec.operands();
        assert_eq!(ops.get(SOL_OPERAND).map(String::as_str), Some("d1h5 b8c6 h5f7#"));
        assert_eq!(ops.get(THEME_OPERAND).and_then(|t| theme_mate(t)), Some(2));
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn theme_without_mate_is_ignored() {
        assert_eq!(theme_mate("mate 7"), Some(7));
        assert_eq!(theme_mate("fork"), None);
        assert_eq!(theme_mate("mate x"), None);
    }
}
