//! # lauscher-observability
//!
//! Structured Logging fuer Lauscher via tracing-subscriber (Text oder JSON),
//! konfigurierbar ueber die `[logging]`-Sektion und Umgebungsvariablen.

pub mod logging;

pub use logging::{logging_initialisieren, LogEinstellungen, LogFormat, LoggingFehler};
