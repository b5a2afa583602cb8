//! Teilnehmer-Ereignisse und Abonnement-Schnittstelle
//!
//! Das Gateway (extern) meldet, wer spricht, wer verbunden ist und wer den
//! Kanal verlassen hat. Der Router abonniert diese Ereignisse ueber
//! [`EreignisQuelle`] und erhaelt dafuer eine [`Abmeldung`] zurueck, die er
//! beim Herunterfahren einloest.
//!
//! [`EreignisHub`] ist die In-Process-Implementierung: Handler werden
//! synchron im Thread des Senders aufgerufen.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{StreamKey, TeilnehmerId};

/// Ereignisse, die Registrierung und Abmeldung im Router ausloesen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeilnehmerEreignis {
    /// Sprech-Status eines Teilnehmers hat sich geaendert
    Spricht {
        teilnehmer: TeilnehmerId,
        stream_key: StreamKey,
        spricht: bool,
    },
    /// Ein Teilnehmer ist dem Kanal beigetreten
    Verbunden {
        teilnehmer: TeilnehmerId,
        stream_key: StreamKey,
    },
    /// Ein Teilnehmer hat den Kanal verlassen
    Getrennt { teilnehmer: TeilnehmerId },
}

impl TeilnehmerEreignis {
    /// Gibt den betroffenen Teilnehmer zurueck
    pub fn teilnehmer(&self) -> TeilnehmerId {
        match self {
            Self::Spricht { teilnehmer, .. }
            | Self::Verbunden { teilnehmer, .. }
            | Self::Getrennt { teilnehmer } => *teilnehmer,
        }
    }
}

/// Handler fuer Teilnehmer-Ereignisse
pub type EreignisHandler = Arc<dyn Fn(&TeilnehmerEreignis) + Send + Sync>;

/// Quelle von Teilnehmer-Ereignissen (z.B. Voice-Gateway)
pub trait EreignisQuelle: Send + Sync {
    /// Registriert einen Handler. Die zurueckgegebene `Abmeldung` entfernt ihn wieder.
    fn abonnieren(&self, handler: EreignisHandler) -> Abmeldung;
}

/// Abbruch-Handle eines Abonnements
///
/// Wird nicht beim Drop eingeloest – nur `abmelden()` entfernt den Handler.
pub struct Abmeldung {
    aktion: Option<Box<dyn FnOnce() + Send>>,
}

impl Abmeldung {
    /// Erstellt ein Handle aus einer Abbruch-Aktion
    pub fn neu(aktion: impl FnOnce() + Send + 'static) -> Self {
        Self {
            aktion: Some(Box::new(aktion)),
        }
    }

    /// Handle ohne Wirkung
    pub fn leer() -> Self {
        Self { aktion: None }
    }

    /// Loest das Abonnement
    pub fn abmelden(mut self) {
        if let Some(aktion) = self.aktion.take() {
            aktion();
        }
    }
}

impl std::fmt::Debug for Abmeldung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Abmeldung")
            .field("aktiv", &self.aktion.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EreignisHub
// ---------------------------------------------------------------------------

/// In-Process Ereignis-Verteiler
///
/// `Clone`-faehig (innerer Arc); alle Klone teilen dieselben Abonnenten.
#[derive(Clone, Default)]
pub struct EreignisHub {
    inner: Arc<EreignisHubInner>,
}

#[derive(Default)]
struct EreignisHubInner {
    handler: Mutex<Vec<(u64, EreignisHandler)>>,
    naechste_id: AtomicU64,
}

impl EreignisHub {
    /// Erstellt einen Hub ohne Abonnenten
    pub fn neu() -> Self {
        Self::default()
    }

    /// Stellt ein Ereignis allen Abonnenten zu
    ///
    /// Die Handler laufen ausserhalb des Hub-Locks, damit sie selbst
    /// abonnieren oder abmelden duerfen.
    pub fn senden(&self, ereignis: TeilnehmerEreignis) {
        let handler: Vec<EreignisHandler> = self
            .inner
            .handler
            .lock()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        tracing::trace!(
            teilnehmer = %ereignis.teilnehmer(),
            empfaenger = handler.len(),
            "Teilnehmer-Ereignis verteilt"
        );

        for h in handler {
            h(&ereignis);
        }
    }

    /// Anzahl aktiver Abonnements
    pub fn abonnenten_anzahl(&self) -> usize {
        self.inner.handler.lock().len()
    }
}

impl EreignisQuelle for EreignisHub {
    fn abonnieren(&self, handler: EreignisHandler) -> Abmeldung {
        let id = self.inner.naechste_id.fetch_add(1, Ordering::Relaxed);
        self.inner.handler.lock().push((id, handler));

        let inner = Arc::downgrade(&self.inner);
        Abmeldung::neu(move || {
            if let Some(inner) = inner.upgrade() {
                inner.handler.lock().retain(|(eintrag, _)| *eintrag != id);
            }
        })
    }
}
