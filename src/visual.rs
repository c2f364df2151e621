//src/visual.rs
// Interface visual: consome os eventos do worker e desenha progresso no terminal

// Biblioteca padrão
use std::path::Path;
use std::time::Duration;

// Bibliotecas externas
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::Level;
use tokio::sync::mpsc::UnboundedReceiver;

// Módulos internos
use crate::progress::{PipelineEvent, PipelineProgress, RunState};
use crate::utils::format_duration;

// Mensagens coloridas
pub fn print_error(message: &str) {
    println!("{}", message.red().bold());
}

pub fn print_success(message: &str) {
    println!("{}", message.green().bold());
}

// Estrutura para barra de progresso personalizada
pub struct CustomProgressBar {
    progress_bar: ProgressBar,
}

impl CustomProgressBar {
    pub fn new(total: u64) -> Self {
        let pb = ProgressBar::new(total);
        pb.set_style(ProgressStyle::default_bar()
            .template("{spinner:.blue} {msg} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"));
        CustomProgressBar { progress_bar: pb }
    }

    /// Atualiza posição, total e mensagem (mantidas + ETA)
    pub fn update(&self, p: &PipelineProgress) {
        self.progress_bar.set_length(p.total);
        self.progress_bar.set_position(p.processed);
        self.progress_bar.set_message(format!(
            "mantidas {} · ETA {}",
            p.kept,
            format_duration(Duration::from_secs_f64(p.eta_secs.max(0.0)))
        ));
    }

    /// Log acima da barra, colorido pelo nível
    pub fn log(&self, level: Level, msg: &str) {
        let line = match level {
            Level::Error => msg.red().bold(),
            Level::Warn  => msg.yellow(),
            Level::Info  => msg.normal(),
            _            => msg.dimmed(),
        };
        self.progress_bar.println(line.to_string());
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.progress_bar.finish_with_message(msg.to_string());
    }
}

/// Consome o canal até o worker soltar o emissor; devolve o estado final recebido
pub async fn drain_events(mut rx: UnboundedReceiver<PipelineEvent>) -> Option<RunState> {
    let bar = CustomProgressBar::new(0);
    let mut finished = None;
    while let Some(ev) = rx.recv().await {
        match ev {
            PipelineEvent::Progress(p)     => bar.update(&p),
            PipelineEvent::Log(level, msg) => bar.log(level, &msg),
            PipelineEvent::Finished(state) => finished = Some(state),
        }
    }
    let label = match &finished {
        Some(RunState::Completed)  => "concluído",
        Some(RunState::Cancelled)  => "cancelado",
        Some(RunState::Failed(_))  => "falhou",
        None                       => "interrompido",
    };
    bar.finish_with_message(label);
    finished
}

// Imprime o cabeçalho principal
pub fn print_main_header(title: &str) {
    println!("\n{}", format!("♟️  {title}").blue().bold());
    println!("{}", "═".repeat(50).cyan());
}

// Imprime informações do engine
pub fn print_engine_info(engine_path: &Path, depth: u8, threads: u16, mate_limit: u8) {
    println!("{} {}", "Engine:".blue().bold(), engine_path.display());
    println!("Profundidade: {} · Threads: {} · Mate ≤ {}",
        depth.to_string().cyan(), threads.to_string().cyan(), mate_limit.to_string().cyan());
}

// Resumo final de uma execução
pub fn render_end_statistics(label: &str, processed: u64, total: u64, kept: u64, elapsed: Duration, output: &Path) {
    println!("Estatísticas de {label}:");
    println!("- Linhas processadas: {processed}/{total}");
    println!("- Mantidas: {}", kept.to_string().green());
    println!("- Tempo total: {}", format_duration(elapsed));
    println!("\nSaída em: {}", output.display());
}
