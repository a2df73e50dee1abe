//! Interface de terminal do jobscribe: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] recebe os eventos da orquestração
//! e os mostra no terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use jobscribe::{OrchestrationOutcome, ProgressEvent, ProgressObserver, RunRecord};

/// Indicador visual de progresso para uma transcrição no terminal.
///
/// Exibe um spinner animado com o estado atual e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e retentativa (amarelo).
pub struct JobProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl JobProgress {
    /// Inicia o spinner com o nome do arquivo e retorna a instância de progresso.
    pub fn start(filename: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .expect("invalid template"),
        );
        pb.set_message(format!("IDLE: {filename}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Finaliza o spinner e exibe o resultado final.
    ///
    /// Sucesso mostra a transcrição; falha mostra o estágio e o motivo em vermelho.
    pub fn complete(&self, outcome: &OrchestrationOutcome) {
        self.pb.finish_and_clear();
        match outcome {
            OrchestrationOutcome::Success { transcript } => {
                println!(
                    "  {} Transcribed {}",
                    self.green.apply_to("✓"),
                    self.dim.apply_to(transcript.job_id())
                );
                println!("{}", transcript.text());
            }
            OrchestrationOutcome::Failure { stage, reason } => {
                eprintln!("  {} Failed at {stage}: {reason}", self.red.apply_to("✗"));
            }
        }
    }

    /// Imprime o registro da execução formatado em JSON com estilo colorido.
    pub fn print_record(&self, record: &RunRecord) {
        let style = if record.succeeded { &self.green } else { &self.red };
        println!();
        println!("{}", style.apply_to("─── Run Record ───"));
        println!("{}", serde_json::to_string_pretty(record).unwrap_or_default());
    }
}

impl ProgressObserver for JobProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StateChanged(state) => self.pb.set_message(state.to_string()),
            ProgressEvent::Uploaded(location) => {
                self.pb.println(format!("  {} uploaded {location}", self.dim.apply_to("↑")));
            }
            ProgressEvent::Submitted(job_id) => {
                self.pb.println(format!("  {} submitted {job_id}", self.dim.apply_to("→")));
            }
            ProgressEvent::Polled { attempt, status } => {
                self.pb.set_message(format!("POLLING: {status} (poll {attempt})"));
            }
            ProgressEvent::Retrying {
                stage,
                attempt,
                max_retries,
                delay,
                reason,
            } => {
                self.pb.println(format!(
                    "  {} Retry {stage} {attempt}/{max_retries} in {}ms: {reason}",
                    self.yellow.apply_to("↻"),
                    delay.as_millis()
                ));
            }
            ProgressEvent::Finished { .. } => {}
        }
    }
}
