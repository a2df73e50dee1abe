//! Configuração do jobscribe carregada a partir de `jobscribe.toml`.
//!
//! A struct [`JobscribeConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `JOBSCRIBE_API_TOKEN`, `JOBSCRIBE_STORE_ENDPOINT`
//! e `JOBSCRIBE_JOB_API_ENDPOINT` têm precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use jobscribe::{OrchestratorSettings, PollPolicy, RetryConfig};

pub const DEFAULT_CONFIG_FILE: &str = "jobscribe.toml";

/// Configuração de nível superior carregada de `jobscribe.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobscribeConfig {
    /// Token bearer enviado ao armazenamento e à API de jobs.
    #[serde(default)]
    pub api_token: String,

    /// URL base do armazenamento de artefatos.
    #[serde(default)]
    pub store_endpoint: String,

    /// URL base da API de jobs de transcrição.
    #[serde(default)]
    pub job_api_endpoint: String,

    /// Esquema das localizações de objetos (`s3://bucket/key`).
    #[serde(default = "default_location_scheme")]
    pub location_scheme: String,

    #[serde(default = "default_input_bucket")]
    pub input_bucket: String,

    #[serde(default = "default_output_bucket")]
    pub output_bucket: String,

    #[serde(default = "default_language_code")]
    pub language_code: String,

    /// Intervalo inicial entre consultas de status.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Teto do intervalo entre consultas. Igual a `poll_interval_ms` para cadência fixa.
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,

    /// Tempo máximo de espera por um estado terminal.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Falhas transitórias consecutivas de consulta toleradas.
    #[serde(default = "default_query_retries")]
    pub query_retries: u32,

    /// Máximo de retentativas de envio e de download.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Limite de tempo de cada requisição remota.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_location_scheme() -> String {
    "s3".to_string()
}

fn default_input_bucket() -> String {
    "awstranscribeinput".to_string()
}

fn default_output_bucket() -> String {
    "awstranscribeoutput".to_string()
}

fn default_language_code() -> String {
    "en-US".to_string()
}

// 5s entre consultas.
fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_max_poll_interval_ms() -> u64 {
    5000
}

// 15 minutos.
fn default_max_wait_secs() -> u64 {
    900
}

fn default_query_retries() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for JobscribeConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            store_endpoint: String::new(),
            job_api_endpoint: String::new(),
            location_scheme: default_location_scheme(),
            input_bucket: default_input_bucket(),
            output_bucket: default_output_bucket(),
            language_code: default_language_code(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
            query_retries: default_query_retries(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl JobscribeConfig {
    /// Carrega a configuração de `path`, ou de `jobscribe.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_file(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str::<JobscribeConfig>(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Variáveis de ambiente não vazias substituem os valores do arquivo.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides = [
            ("JOBSCRIBE_API_TOKEN", &mut self.api_token),
            ("JOBSCRIBE_STORE_ENDPOINT", &mut self.store_endpoint),
            ("JOBSCRIBE_JOB_API_ENDPOINT", &mut self.job_api_endpoint),
        ];
        for (name, field) in overrides {
            if let Some(value) = lookup(name) {
                if !value.is_empty() {
                    *field = value;
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if self.max_wait_secs == 0 {
            bail!("max_wait_secs must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        (!self.api_token.is_empty()).then(|| self.api_token.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_interval: Duration::from_millis(
                self.max_poll_interval_ms.max(self.poll_interval_ms),
            ),
            max_wait: Duration::from_secs(self.max_wait_secs),
            query_retries: self.query_retries,
            retry: self.retry_config(),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            input_bucket: self.input_bucket.clone(),
            output_bucket: self.output_bucket.clone(),
            language_code: self.language_code.clone(),
            retry: self.retry_config(),
            poll: self.poll_policy(),
            request_timeout: self.request_timeout(),
        }
    }
}
