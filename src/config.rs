// Configurações centralizadas para o filtro de mates em EPD

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

// Configurações padrão para argumentos da linha de comando
pub const DEFAULT_DEPTH: u8 = 20;                  // Profundidade padrão para análise
pub const DEFAULT_THREADS: u16 = 1;                // Threads do engine
pub const DEFAULT_MATE_LIMIT: u8 = 6;              // Mate em até N lances

// Limites aceitos pela interface externa
pub const MAX_DEPTH: u8 = 128;
pub const MAX_THREADS: u16 = 16;
pub const MAX_MATE_LIMIT: u8 = 12;

// Valores fixos do catálogo de puzzles
pub const CATALOG_THEME: &str = "Mates";           // Rótulo temático constante (theme e pattern)
pub const PUZZLE_ELO: u32 = 1200;                  // Rating semente de cada puzzle

// Marcador terminal anexado ao lance que dá mate
pub const MATE_MARKER: char = '#';

// Sufixos usados para sugerir caminhos de saída
pub const FILTERED_SUFFIX: &str = "_mates.epd";
pub const CATALOG_SUFFIX: &str = "_mates.json";

/// Configuração imutável de uma sessão de engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub executable_path: PathBuf,  // Executável UCI
    pub args:            Vec<String>, // Argumentos extras repassados ao executável
    pub depth:           u8,       // Profundidade de busca por posição
    pub threads:         u16,      // Opção Threads (melhor esforço)
}

impl EngineConfig {
    pub fn new(executable_path: impl Into<PathBuf>) -> Self {
        Self {
            executable_path: executable_path.into(),
            args:            Vec::new(),
            depth:           DEFAULT_DEPTH,
            threads:         DEFAULT_THREADS,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depth == 0 || self.depth > MAX_DEPTH {
            return Err(ConfigError::Depth(self.depth));
        }
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(ConfigError::Threads(self.threads));
        }
        Ok(())
    }
}

/// Configuração do pipeline de filtragem
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub input:          PathBuf,
    pub output:         PathBuf,
    pub engine:         EngineConfig,
    pub mate_limit:     u8,               // Mantém linhas com 1 <= mate <= limite
    pub add_solution:   bool,             // Anexa operandos sol/theme
    pub catalog:        Option<PathBuf>,  // Exporta catálogo JSON junto com o filtro
    pub fix_move_order: bool,             // Vencedor sempre joga primeiro
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        if self.mate_limit > MAX_MATE_LIMIT {
            return Err(ConfigError::MateLimit(self.mate_limit));
        }
        if self.input == self.output {
            return Err(ConfigError::SameInputOutput(self.input.clone()));
        }
        Ok(())
    }
}

/// Configuração do construtor de puzzles
#[derive(Debug, Clone)]
pub struct PuzzleConfig {
    pub input:          PathBuf,
    pub catalog:        PathBuf,
    pub fix_move_order: bool,
}

/// Sugere `<stem><suffix>` na mesma pasta da entrada
pub fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    input.with_file_name(format!("{stem}{suffix}"))
}
