// src/catalog.rs
// Serializa os puzzles acumulados no catálogo JSON de saída

// Biblioteca padrão
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// Bibliotecas externas
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

// Módulos internos
use crate::config::{CATALOG_THEME, PUZZLE_ELO};
use crate::utils::ensure_parent_dir;

/// Um puzzle: posição inicial + sequência vencedora
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleEntry {
    pub fen:           String,
    pub solution:      Vec<String>,
    pub moves_to_mate: u32,
    pub elo:           u32,
    pub solved:        u32,
    pub failed:        u32,
}

impl PuzzleEntry {
    /// Contadores sempre começam zerados
    pub fn new(fen: String, solution: Vec<String>, moves_to_mate: u32) -> Self {
        Self { fen, solution, moves_to_mate, elo: PUZZLE_ELO, solved: 0, failed: 0 }
    }
}

/// Payload de forma fixa: rótulo temático constante + lista de puzzles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleCatalog {
    pub theme:   String,
    pub pattern: String,
    pub puzzles: Vec<PuzzleEntry>,
}

impl PuzzleCatalog {
    pub fn new(puzzles: Vec<PuzzleEntry>) -> Self {
        Self { theme: CATALOG_THEME.into(), pattern: CATALOG_THEME.into(), puzzles }
    }

    /// Serializa com indentação de 2 espaços
    pub fn write_to(&self, output: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *output, self).context("Falha ao serializar catálogo")?;
        writeln!(output).context("Falha ao escrever quebra de linha no catálogo")?;
        Ok(())
    }
}

/// Grava o catálogo em `path`, sobrescrevendo o destino (sem mesclar nem deduplicar)
pub fn write_catalog(path: &Path, puzzles: Vec<PuzzleEntry>) -> Result<usize> {
    info!("write_catalog: {} puzzles → {}", puzzles.len(), path.display());
    ensure_parent_dir(path).with_context(|| format!("criar pasta de {}", path.display()))?;

    let catalog = PuzzleCatalog::new(puzzles);
    let file = File::create(path).with_context(|| format!("criar {}", path.display()))?;
    let mut out = BufWriter::new(file);
    catalog.write_to(&mut out)?;
    out.flush().context("Falha ao gravar catálogo")?;

    debug!("write_catalog: catálogo gravado com sucesso");
    Ok(catalog.puzzles.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_has_fixed_shape() {
        let entry = PuzzleEntry::new("8/8/8/8/8/8/8/8 w - - 0 1".into(), vec!["d8h4#".into()], 1);
        let value = serde_json::to_value(PuzzleCatalog::new(vec![entry])).unwrap();
        assert_eq!(value["theme"], "Mates");
        assert_eq!(value["pattern"], "Mates");
        let p = &value["puzzles"][0];
        assert_eq!(p["solution"][0], "d8h4#");
        assert_eq!(p["moves_to_mate"], 1);
        assert_eq!(p["elo"], 1200);
        assert_eq!(p["solved"], 0);
        assert_eq!(p["failed"], 0);
    }

    #[test]
    fn repeated_writes_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/mates.json");
        let e = |n| PuzzleEntry::new(format!("fen {n}"), vec!["a1a2#".into()], n);

        assert_eq!(write_catalog(&path, vec![e(1), e(2)]).unwrap(), 2);
        assert_eq!(write_catalog(&path, vec![e(3)]).unwrap(), 1);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"theme\": \"Mates\""));
        let back: PuzzleCatalog = serde_json::from_str(&text).unwrap();
        assert_eq!(back.puzzles, vec![e(3)]);
    }
}
