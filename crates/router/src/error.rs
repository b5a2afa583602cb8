//! Fehlertypen des Stream-Routers

use lauscher_core::{PaketQuellenFehler, PoolFehler, StreamKey, TeilnehmerId};
use thiserror::Error;

/// Alle Fehler von Registrierung und Dispatch-Schleife
#[derive(Debug, Error)]
pub enum RouterFehler {
    /// Kein Teilnehmer fuer diesen Stream-Key registriert (nicht fatal)
    #[error("Unbekannter Stream-Key: {0}")]
    UnbekannterStreamKey(StreamKey),

    /// Router wurde heruntergefahren oder ist nach einem Erstellungsfehler gesperrt
    #[error("Router ist geschlossen")]
    Geschlossen,

    /// Session-Ausleihe beim Pool fehlgeschlagen
    #[error("Session-Ausleihe fehlgeschlagen: {0}")]
    Ausleihe(#[from] PoolFehler),

    #[error("Stream-Key {stream_key} gehoert bereits {besitzer}")]
    StreamKeyBelegt {
        stream_key: StreamKey,
        besitzer: TeilnehmerId,
    },

    #[error("Paketquelle fehlgeschlagen: {0}")]
    PaketQuelle(#[from] PaketQuellenFehler),
}

impl RouterFehler {
    /// Gibt true zurueck wenn der Fehler die Dispatch-Schleife beendet
    pub fn ist_fatal(&self) -> bool {
        !matches!(
            self,
            Self::UnbekannterStreamKey(_) | Self::StreamKeyBelegt { .. }
        )
    }
}
