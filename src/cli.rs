//! Interface de linha de comando do jobscribe baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (transcribe, status, demo)
//! e flags globais (--verbose, --config).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// jobscribe: transcrição de áudio via serviço remoto de jobs.
#[derive(Debug, Parser)]
#[command(name = "jobscribe", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: `jobscribe.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia um arquivo de áudio e imprime a transcrição.
    Transcribe {
        /// Arquivo de áudio; o formato vem da extensão.
        file: PathBuf,

        /// Código de idioma, por exemplo `en-US`.
        #[arg(long)]
        language: Option<String>,

        /// Tempo máximo de espera pelo job, em segundos.
        #[arg(long)]
        max_wait: Option<u64>,

        /// Intervalo entre consultas de status, em milissegundos.
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Imprime o registro da execução em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Consulta uma vez o status de um job.
    Status {
        /// Nome do job (`transcription-job-<uuid>`).
        job_name: String,
    },

    /// Executa o exemplo completo contra serviços em memória.
    Demo {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
