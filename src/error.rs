// src/error.rs
// Taxonomia de erros do pipeline (fatais vs. recuperáveis por linha)

use std::path::PathBuf;

use thiserror::Error;

/// Configuração fora dos limites aceitos
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("profundidade fora de 1..=128: {0}")]
    Depth(u8),

    #[error("threads fora de 1..=16: {0}")]
    Threads(u16),

    #[error("limite de mate fora de 0..=12: {0}")]
    MateLimit(u8),

    #[error("entrada e saída apontam para o mesmo arquivo: {0}")]
    SameInputOutput(PathBuf),
}

/// Texto de posição inválido numa linha (recuperável: pula a linha)
#[derive(Error, Debug)]
pub enum PositionError {
    #[error("linha vazia")]
    Empty,

    #[error("FEN inválido: {0}")]
    Fen(#[from] shakmaty::fen::ParseFenError),

    #[error("posição ilegal: {0}")]
    Illegal(String),
}

/// Falhas do engine externo
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("falha ao iniciar engine {path}: {reason}")]
    Start { path: PathBuf, reason: String },

    #[error("falha na análise: {0}")]
    Analysis(String),

    #[error("engine não suporta a opção {0}")]
    UnsupportedOption(String),

    #[error("engine já foi encerrado")]
    Closed,
}

/// Lance da solução inválido (recuperável: descarta o token)
#[derive(Error, Debug, Clone)]
pub enum MoveError {
    #[error("token sem lance: {0:?}")]
    Unparsable(String),

    #[error("lance ilegal na posição atual: {0}")]
    Illegal(String),
}

/// Erros fatais de uma execução de pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("arquivo de entrada ausente: {0}")]
    MissingInput(PathBuf),

    #[error("arquivo de entrada vazio: {0}")]
    EmptyInput(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("erro de E/S: {0}")]
    Io(#[from] std::io::Error),
}
