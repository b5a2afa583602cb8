//! Lauscher – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und spielt den
//! konfigurierten Paketstrom ueber Pool und Router ab.

use anyhow::Result;
use lauscher_app::{config::AppConfig, App};
use lauscher_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("LAUSCHER_CONFIG").unwrap_or_else(|_| "lauscher.toml".into());

    let config = AppConfig::laden(&config_pfad)?;
    logging_initialisieren(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Lauscher wird initialisiert"
    );

    let app = App::neu(config)?;
    if let Err(e) = app.starten().await {
        tracing::error!(fehler = %format!("{e:#}"), "Lauscher mit Fehler beendet");
        return Err(e);
    }

    Ok(())
}
