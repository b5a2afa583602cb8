//! Fehlertypen an den Schnittstellen zwischen Pool, Router und Sessions
//!
//! Router-spezifische Fehler liegen im Router-Crate und konvertieren
//! via `#[from]` aus den hier definierten Typen.

use std::sync::Arc;

use thiserror::Error;

/// Fehler einer einzelnen Session (Schreiben, Schliessen, Erstellen)
#[derive(Debug, Error)]
pub enum SessionFehler {
    #[error("Session ist geschlossen")]
    Geschlossen,

    #[error("Schreiben fehlgeschlagen: {0}")]
    Schreiben(String),

    #[error("Ausgabe-Fehler: {0}")]
    Ausgabe(String),

    #[error("Session-Erstellung fehlgeschlagen: {0}")]
    Erstellung(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

/// Fehler des Session-Pools
#[derive(Debug, Clone, Error)]
pub enum PoolFehler {
    /// Die Session-Fabrik ist fehlgeschlagen
    #[error("Session konnte nicht erstellt werden: {0}")]
    Erstellung(#[source] Arc<SessionFehler>),

    /// Kein Leerlauf-Eintrag vorhanden (oder Pool gestoppt)
    #[error("Keine Sessions im Pool verfuegbar")]
    KeineSessionsVerfuegbar,

    #[error("Ungueltige Pool-Konfiguration: {0}")]
    Konfiguration(String),
}

impl PoolFehler {
    /// Gibt true zurueck fuer das erwartete, nicht-fatale Ergebnis von `versuchen_holen`
    pub fn ist_leer(&self) -> bool {
        matches!(self, Self::KeineSessionsVerfuegbar)
    }
}

impl From<SessionFehler> for PoolFehler {
    fn from(e: SessionFehler) -> Self {
        Self::Erstellung(Arc::new(e))
    }
}

/// Fehler der Paketquelle – beendet immer die Dispatch-Schleife
#[derive(Debug, Error)]
pub enum PaketQuellenFehler {
    /// Regulaeres Ende des Paketstroms
    #[error("Paketstrom beendet")]
    StreamEnde,

    #[error("Ungueltiges Paket: {0}")]
    UngueltigesPaket(String),

    #[error("Transportfehler: {0}")]
    Io(#[from] std::io::Error),
}

impl PaketQuellenFehler {
    /// Gibt true zurueck wenn die Quelle regulaer erschoepft ist
    pub fn ist_stream_ende(&self) -> bool {
        matches!(self, Self::StreamEnde)
    }
}
