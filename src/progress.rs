// src/progress.rs
// Eventos tipados do worker para o chamador: progresso, log e conclusão

// Biblioteca padrão
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Bibliotecas externas
use log::Level;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Snapshot recalculado após cada linha processada
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineProgress {
    pub processed: u64,
    pub total:     u64,
    pub kept:      u64,
    pub percent:   u8,
    pub eta_secs:  f64,
}

/// Estado final de uma execução
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState { Completed, Cancelled, Failed(String) }

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Progress(PipelineProgress),
    Log(Level, String),
    Finished(RunState),
}

/// Lado emissor do canal; falhas de envio (receptor encerrado) são ignoradas
#[derive(Debug, Clone)]
pub struct EventSink { tx: UnboundedSender<PipelineEvent> }

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn progress(&self, p: PipelineProgress) {
        let _ = self.tx.send(PipelineEvent::Progress(p));
    }

    pub fn log(&self, level: Level, msg: impl Into<String>) {
        let _ = self.tx.send(PipelineEvent::Log(level, msg.into()));
    }

    pub fn info(&self, msg: impl Into<String>) { self.log(Level::Info, msg) }

    pub fn warn(&self, msg: impl Into<String>) { self.log(Level::Warn, msg) }

    pub fn finished(&self, state: RunState) {
        let _ = self.tx.send(PipelineEvent::Finished(state));
    }
}

/// Sinal de cancelamento cooperativo, consultado uma vez por linha
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst) }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/// Estimativa de tempo restante pela média de tempo por linha
#[derive(Debug, Clone)]
pub struct EtaTracker {
    start: Instant,
    total: u64,
}

impl EtaTracker {
    pub fn new(total: u64) -> Self { Self { start: Instant::now(), total } }

    pub fn elapsed(&self) -> Duration { self.start.elapsed() }

    /// Monta o snapshot para `processed` linhas concluídas
    pub fn snapshot(&self, processed: u64, kept: u64) -> PipelineProgress {
        self.snapshot_at(self.elapsed(), processed, kept)
    }

    fn snapshot_at(&self, elapsed: Duration, processed: u64, kept: u64) -> PipelineProgress {
        let eta_secs = if processed == 0 {
            0.0
        } else {
            let avg = elapsed.as_secs_f64() / processed as f64;
            self.total.saturating_sub(processed) as f64 * avg
        };
        PipelineProgress { processed, total: self.total, kept, percent: percent(processed, self.total), eta_secs }
    }

    /// Emissão final: 100% e ETA zero, qualquer que seja o caminho de saída
    pub fn final_snapshot(&self, processed: u64, kept: u64) -> PipelineProgress {
        PipelineProgress { processed, total: self.total, kept, percent: 100, eta_secs: 0.0 }
    }
}

fn percent(processed: u64, total: u64) -> u8 {
    if total == 0 { return 100; }
    ((processed.min(total) * 100) / total) as u8
}
