// src/engine.rs
// ---------------------------------------------------------------------------
// Sessão de engine: um processo UCI de longa duração, uma análise por vez.
// ---------------------------------------------------------------------------
//  * Fronteira:  EngineSession (configure_threads / analyze / shutdown)
//  * Processo:   UciEngine (tokio::process, stdin/stdout em pipe)
//  * Liberação:  shutdown() idempotente + kill no Drop
// ---------------------------------------------------------------------------

use std::{collections::HashSet, future::Future, path::PathBuf, process::Stdio};

use log::{debug, trace, warn};
use shakmaty::{uci::UciMove, Chess, Color, Position};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    time::{timeout, Duration},
};

use crate::{config::EngineConfig, epd::fen_of, error::EngineError};

/// Tempo de espera pelo encerramento após `quit`
const QUIT_GRACE: Duration = Duration::from_secs(2);

/// Score retornado pelo engine, do ponto de vista de quem joga
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score { Cp(i32), Mate(i32) }

impl Score {
    /// Distância de mate, se o score for de mate
    pub fn mate(&self) -> Option<i32> {
        match self { Score::Mate(n) => Some(*n), Score::Cp(_) => None }
    }

    fn negate(self) -> Self {
        match self { Score::Cp(v) => Score::Cp(-v), Score::Mate(n) => Score::Mate(-n) }
    }
}

/// Score atrelado à cor de referência em que foi reportado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PovScore { pub color: Color, pub score: Score }

impl PovScore {
    /// Reexpressa o score do ponto de vista de `color`
    pub fn pov(&self, color: Color) -> Score {
        if self.color == color { self.score } else { self.score.negate() }
    }
}

/// Forma fixa do score entregue ao extrator de mate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreReport {
    pub relative: Option<Score>,    // Score cru, relativo a quem joga
    pub pov:      Option<PovScore>, // Score com cor de referência explícita
    pub text:     Option<String>,   // Trecho textual "score ..." da linha info
}

/// Resultado de uma análise: score + variante principal
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub score: ScoreReport,
    pub pv:    Vec<UciMove>,
}

/// Fronteira de capacidade do engine externo.
///
/// Uma chamada em voo por vez; o protocolo real fica encapsulado no implementador.
pub trait EngineSession: Send {
    /// Aplica o número de threads (melhor esforço; o chamador decide se loga)
    fn configure_threads(&mut self, threads: u16) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Busca com profundidade limitada; bloqueia até a resposta
    fn analyze(&mut self, board: &Chess, depth: u8) -> impl Future<Output = Result<AnalysisResult, EngineError>> + Send;

    /// Encerra o engine; chamadas repetidas não fazem nada
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Engine UCI em subprocesso
pub struct UciEngine {
    child:   Child,
    stdin:   ChildStdin,
    stdout:  BufReader<ChildStdout>,
    path:    PathBuf,
    options: HashSet<String>, // Opções anunciadas no handshake
    closed:  bool,
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        if !self.closed { let _ = self.child.start_kill(); }
    }
}

impl UciEngine {
    /// Inicia o executável e conclui o handshake `uci`/`uciok` + `isready`/`readyok`
    pub async fn open(cfg: &EngineConfig) -> Result<Self, EngineError> {
        let path = cfg.executable_path.clone();
        let start_err = |reason: String| EngineError::Start { path: path.clone(), reason };

        let mut child = Command::new(&cfg.executable_path)
            .args(&cfg.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| start_err(e.to_string()))?;
        let stdin  = child.stdin.take().ok_or_else(|| start_err("stdin indisponível".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| start_err("stdout indisponível".into()))?;

        // a partir daqui o Drop garante o kill em qualquer falha
        let mut engine = UciEngine {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            path: cfg.executable_path.clone(),
            options: HashSet::new(),
            closed: false,
        };
        engine.handshake().await.map_err(|e| start_err(e.to_string()))?;
        engine.wait_ready().await.map_err(|e| start_err(e.to_string()))?;
        debug!("engine {} pronto ({} opções)", engine.path.display(), engine.options.len());
        Ok(engine)
    }

    /// Envia "uci" e coleta `option name ...` até "uciok"
    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.cmd("uci").await?;
        loop {
            let line = self.expect_line().await?;
            if let Some(name) = parse_option_name(&line) {
                self.options.insert(name);
            } else if line == "uciok" {
                return Ok(());
            }
        }
    }

    /// Envia "isready" e espera por "readyok"
    async fn wait_ready(&mut self) -> Result<(), EngineError> {
        self.cmd("isready").await?;
        while self.expect_line().await? != "readyok" {}
        Ok(())
    }

    /// Envia comando UCI
    async fn cmd(&mut self, c: &str) -> Result<(), EngineError> {
        trace!("engine < {c}");
        let io = |e: std::io::Error| EngineError::Analysis(format!("escrita no engine: {e}"));
        self.stdin.write_all(c.as_bytes()).await.map_err(io)?;
        self.stdin.write_all(b"\n").await.map_err(io)?;
        self.stdin.flush().await.map_err(io)
    }

    /// Lê a próxima linha não vazia; EOF vira erro
    async fn expect_line(&mut self) -> Result<String, EngineError> {
        let mut buf = String::new();
        loop {
            buf.clear();
            let n = self.stdout.read_line(&mut buf).await
                .map_err(|e| EngineError::Analysis(format!("leitura do engine: {e}")))?;
            if n == 0 { return Err(EngineError::Analysis("engine encerrou a saída".into())); }
            let line = buf.trim();
            if line.is_empty() { continue; }
            trace!("engine > {line}");
            return Ok(line.to_string());
        }
    }
}

impl EngineSession for UciEngine {
    async fn configure_threads(&mut self, threads: u16) -> Result<(), EngineError> {
        if self.closed { return Err(EngineError::Closed); }
        if !self.options.contains("Threads") {
            return Err(EngineError::UnsupportedOption("Threads".into()));
        }
        self.cmd(&format!("setoption name Threads value {}", threads.max(1))).await?;
        self.wait_ready().await
    }

    async fn analyze(&mut self, board: &Chess, depth: u8) -> Result<AnalysisResult, EngineError> {
        if self.closed { return Err(EngineError::Closed); }
        let turn = board.turn();
        self.cmd(&format!("position fen {}", fen_of(board))).await?;
        self.cmd(&format!("go depth {depth}")).await?;

        let mut last: Option<InfoLine> = None;
        loop {
            let line = self.expect_line().await?;
            if line.starts_with("bestmove") { break; }
            if line.starts_with("info ") {
                if let Some(info) = parse_info_line(&line) { last = Some(InfoLine::newer(last, info)); }
            }
        }
        Ok(last.map(|i| i.into_result(turn)).unwrap_or_default())
    }

    async fn shutdown(&mut self) {
        if self.closed { return; }
        self.closed = true;
        let _ = self.cmd("quit").await;
        match timeout(QUIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!("engine {} encerrado ({status})", self.path.display()),
            Ok(Err(e))     => warn!("falha aguardando engine: {e}"),
            Err(_)         => {
                warn!("engine não respondeu ao quit; forçando kill");
                let _ = self.child.kill().await;
            }
        }
    }
}

/// Linha `info` já decomposta
#[derive(Debug, Clone, PartialEq)]
struct InfoLine {
    score: Option<Score>,
    text:  Option<String>,
    pv:    Vec<UciMove>,
}

impl InfoLine {
    /// Linha a manter: a mais recente com `pv`; sem `pv` só substitui outra sem `pv`
    fn newer(last: Option<InfoLine>, info: InfoLine) -> InfoLine {
        match last {
            Some(prev) if info.pv.is_empty() && !prev.pv.is_empty() => prev,
            _ => info,
        }
    }

    fn into_result(self, turn: Color) -> AnalysisResult {
        AnalysisResult {
            score: ScoreReport {
                relative: self.score,
                pov:      self.score.map(|score| PovScore { color: turn, score }),
                text:     self.text,
            },
            pv: self.pv,
        }
    }
}

/// Parser UCI "info ... score ... pv ..."; linhas sem score são ignoradas
fn parse_info_line(line: &str) -> Option<InfoLine> {
    let toks: Vec<&str> = line.split_whitespace().collect();
    let at = toks.iter().position(|t| *t == "score")?;
    let pv_at = toks.iter().position(|t| *t == "pv");

    let score = match (toks.get(at + 1), toks.get(at + 2).and_then(|v| v.parse().ok())) {
        (Some(&"cp"), Some(v))   => Some(Score::Cp(v)),
        (Some(&"mate"), Some(v)) => Some(Score::Mate(v)),
        _                        => None,
    };
    let text_end = pv_at.filter(|&p| p > at).unwrap_or(toks.len());
    let text = Some(toks[at..text_end].join(" "));
    let pv = pv_at
        .map(|p| toks[p + 1..].iter().map_while(|u| u.parse::<UciMove>().ok()).collect())
        .unwrap_or_default();
    Some(InfoLine { score, text, pv })
}

/// Nome da opção em `option name <Nome com espaços> type ...`
fn parse_option_name(line: &str) -> Option<String> {
    let rest = line.strip_prefix("option name ")?;
    let name = rest.split(" type ").next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mate_score_and_pv() {
        let info = parse_info_line("info depth 12 seldepth 3 multipv 1 score mate 2 nodes 812 pv d1h5 b8c6 h5f7").unwrap();
        assert_eq!(info.score, Some(Score::Mate(2)));
        assert_eq!(info.text.as_deref(), Some("score mate 2 nodes 812"));
        let pv: Vec<String> = info.pv.iter().map(|m| m.to_string()).collect();
        assert_eq!(pv, vec!["d1h5", "b8c6", "h5f7"]);
    }

    #[test]
    fn parses_cp_and_bounds() {
        let info = parse_info_line("info depth 20 score cp -35 upperbound nodes 10 pv e7e5").unwrap();
        assert_eq!(info.score, Some(Score::Cp(-35)));
        assert_eq!(info.pv.len(), 1);
    }

    #[test]
    fn unparsable_score_keeps_text() {
        let info = parse_info_line("info depth 5 score mate ?4 pv a2a3").unwrap();
        assert_eq!(info.score, None);
        assert_eq!(info.text.as_deref(), Some("score mate ?4"));
    }

    #[test]
    fn ignores_info_without_score() {
        assert!(parse_info_line("info string NNUE evaluation enabled").is_none());
        assert!(parse_info_line("info depth 3 currmove e2e4 currmovenumber 1").is_none());
    }

    #[test]
    fn mated_position_has_empty_pv() {
        let info = parse_info_line("info depth 0 score mate 0").unwrap();
        assert_eq!(info.score, Some(Score::Mate(0)));
        assert!(info.pv.is_empty());
    }

    #[test]
    fn summary_without_pv_keeps_previous_variation() {
        let with_pv = parse_info_line("info depth 8 score mate 2 pv d1h5 b8c6 h5f7").unwrap();
        let summary = parse_info_line("info depth 8 score mate 2 nodes 900 time 3").unwrap();
        let kept = InfoLine::newer(Some(with_pv.clone()), summary.clone());
        assert_eq!(kept, with_pv);

        // sem variante anterior, o score sem pv ainda vale
        assert_eq!(InfoLine::newer(None, summary.clone()), summary);
        let deeper = parse_info_line("info depth 9 score mate 1 pv h5f7").unwrap();
        assert_eq!(InfoLine::newer(Some(with_pv), deeper.clone()), deeper);
    }

    #[test]
    fn option_names_may_contain_spaces() {
        assert_eq!(parse_option_name("option name Threads type spin default 1 min 1 max 1024").as_deref(), Some("Threads"));
        assert_eq!(parse_option_name("option name Clear Hash type button").as_deref(), Some("Clear Hash"));
        assert_eq!(parse_option_name("id name Stockfish 17"), None);
    }

    #[test]
    fn pov_score_flips_for_other_side() {
        let s = PovScore { color: Color::White, score: Score::Mate(3) };
        assert_eq!(s.pov(Color::White), Score::Mate(3));
        assert_eq!(s.pov(Color::Black), Score::Mate(-3));
        assert_eq!(Score::Cp(40).mate(), None);
    }

    #[cfg(unix)]
    mod process {
        use std::io::Write;

        use super::super::*;
        use crate::epd::parse_position;

        /// Engine UCI mínimo em shell: sempre responde mate em 1 com d8h4, seguido de resumo sem pv
        const FAKE_ENGINE: &str = r#"while read -r line; do
  case "$line" in
    uci) echo "id name FakeMate"; echo "option name Threads type spin default 1 min 1 max 64"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) echo "info depth 1 seldepth 1 score mate 1 nodes 20 pv d8h4"
         echo "info depth 1 score mate 1 nodes 20 time 1"
         echo "bestmove d8h4" ;;
    quit) exit 0 ;;
  esac
done
"#;

        fn fake_config(script: &tempfile::NamedTempFile) -> EngineConfig {
            let mut cfg = EngineConfig::new("/bin/sh");
            cfg.args = vec![script.path().to_string_lossy().into_owned()];
            cfg
        }

        fn script() -> tempfile::NamedTempFile {
            let mut f = tempfile::NamedTempFile::new().unwrap();
            f.write_all(FAKE_ENGINE.as_bytes()).unwrap();
            f.flush().unwrap();
            f
        }

        #[tokio::test]
        async fn talks_uci_to_subprocess() {
            let script = script();
            let mut engine = UciEngine::open(&fake_config(&script)).await.unwrap();
            assert!(engine.options.contains("Threads"));
            engine.configure_threads(2).await.unwrap();

            let board = parse_position("rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2").unwrap();
            let res = engine.analyze(&board, 4).await.unwrap();
            assert_eq!(res.score.relative, Some(Score::Mate(1)));
            assert_eq!(res.score.pov, Some(PovScore { color: Color::Black, score: Score::Mate(1) }));
            assert_eq!(res.pv.len(), 1);
            assert_eq!(res.pv[0].to_string(), "d8h4");

            engine.shutdown().await;
            engine.shutdown().await;
            assert!(matches!(engine.analyze(&board, 4).await, Err(EngineError::Closed)));
        }

        #[tokio::test]
        async fn missing_executable_is_start_error() {
            let cfg = EngineConfig::new("/nonexistent/engine-binary");
            assert!(matches!(UciEngine::open(&cfg).await, Err(EngineError::Start { .. })));
        }
    }
}
