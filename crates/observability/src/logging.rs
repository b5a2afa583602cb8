//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfiguration):
//! - `LAUSCHER_LOG_LEVEL`: Filter-Direktive (z.B. `debug`, `lauscher_router=trace`)
//! - `LAUSCHER_LOG_FORMAT`: `text` oder `json`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG_LEVEL: &str = "LAUSCHER_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LAUSCHER_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum LoggingFehler {
    #[error("Ungueltiger Log-Filter '{filter}': {grund}")]
    Filter { filter: String, grund: String },

    #[error("Unbekanntes Log-Format: {0} (erwartet: text oder json)")]
    Format(String),

    #[error("Logging bereits initialisiert: {0}")]
    BereitsInitialisiert(String),
}

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingFehler;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anders => Err(LoggingFehler::Format(anders.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Logging-Einstellungen (entspricht der `[logging]`-Sektion)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEinstellungen {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LogEinstellungen {
    /// Ueberschreibt Werte mit den gegebenen Umgebungswerten
    pub fn mit_umgebung(
        mut self,
        level: Option<String>,
        format: Option<String>,
    ) -> Result<Self, LoggingFehler> {
        if let Some(level) = level.filter(|l| !l.trim().is_empty()) {
            self.level = level;
        }
        if let Some(format) = format.filter(|f| !f.trim().is_empty()) {
            self.format = format.trim().parse()?;
        }
        Ok(self)
    }

    /// Liest `LAUSCHER_LOG_LEVEL` / `LAUSCHER_LOG_FORMAT`
    pub fn aus_umgebung(self) -> Result<Self, LoggingFehler> {
        self.mit_umgebung(
            std::env::var(ENV_LOG_LEVEL).ok(),
            std::env::var(ENV_LOG_FORMAT).ok(),
        )
    }

    pub fn filter(&self) -> Result<EnvFilter, LoggingFehler> {
        EnvFilter::try_new(&self.level).map_err(|e| LoggingFehler::Filter {
            filter: self.level.clone(),
            grund: e.to_string(),
        })
    }
}

/// Initialisiert das Logging-System.
///
/// Umgebungsvariablen haben Vorrang vor `einstellungen`. Schlaegt fehl,
/// wenn bereits ein globaler Subscriber gesetzt ist.
pub fn logging_initialisieren(einstellungen: &LogEinstellungen) -> Result<(), LoggingFehler> {
    let einstellungen = einstellungen.clone().aus_umgebung()?;
    let filter = einstellungen.filter()?;

    let ergebnis = match einstellungen.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .try_init(),
    };

    ergebnis.map_err(|e| LoggingFehler::BereitsInitialisiert(e.to_string()))?;
    tracing::debug!(
        level = %einstellungen.level,
        format = %einstellungen.format,
        "Logging initialisiert"
    );
    Ok(())
}
