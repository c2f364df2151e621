// src/utils.rs
// ---------------------------------------------------------------------------
// Utilitários de arquivos e formatação (independentes do engine).
// ---------------------------------------------------------------------------

use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, Read},
    path::Path,
    time::Duration,
};

use log::trace;

// ---------------------------------------------------------------------------
// Contagem rápida - primeira passada sequencial sobre a entrada
// ---------------------------------------------------------------------------
/// Conta linhas em blocos de bytes (UTF‑8 inválido não importa aqui)
pub fn count_lines(path: &Path) -> io::Result<u64> {
    let mut f = File::open(path)?;
    let mut buf = vec![0u8; 1 << 20];
    let (mut n, mut last) = (0u64, b'\n');
    loop {
        let read = f.read(&mut buf)?;
        if read == 0 { break; }
        n += buf[..read].iter().filter(|&&b| b == b'\n').count() as u64;
        last = buf[read - 1];
    }
    // última linha sem quebra também conta
    if last != b'\n' { n += 1; }
    trace!("count_lines: {} → {n}", path.display());
    Ok(n)
}

/// Linhas do arquivo sob demanda, decodificadas de forma tolerante
pub fn lossy_lines(path: &Path) -> io::Result<impl Iterator<Item = io::Result<String>>> {
    let rdr = BufReader::new(File::open(path)?);
    Ok(rdr.split(b'\n').map(|raw| raw.map(|r| decode_line(&r))))
}

/// Bytes da linha → texto sem a quebra final
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end_matches(['\r', '\n']).to_string()
}

// ---------------------------------------------------------------------------
// I/O helpers
// ---------------------------------------------------------------------------
/// Garante que o diretório pai de `path` exista
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

/// Formata duração como H:MM:SS
pub fn format_duration(d: Duration) -> String {
    let s = d.as_secs();
    format!("{}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}
