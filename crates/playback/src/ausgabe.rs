//! Ausgabe – Frames, Senken und der geteilte Ausgabekontext
//!
//! Der [`AusgabeKontext`] wird einmal vom Einstiegspunkt erzeugt und per
//! `Arc` an jede Session gereicht. Er haelt die Ausgabeparameter und zaehlt
//! offene Sessions; nach `schliessen()` werden keine neuen Sessions mehr
//! angelegt.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use lauscher_core::{SessionFehler, StreamKey};
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

// ---------------------------------------------------------------------------
// Frame / Senke
// ---------------------------------------------------------------------------

/// Ein akzeptiertes, noch komprimiertes Frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub stream_key: StreamKey,
    pub sequenz: u16,
    /// Laenge in Samples pro Kanal
    pub samples: u32,
    pub nutzdaten: Bytes,
}

/// Ziel der Frames einer Session (laeuft im Worker-Thread der Session)
pub trait FrameSenke: Send + 'static {
    fn frame_schreiben(&mut self, frame: &Frame) -> Result<(), SessionFehler>;

    /// Wird aufgerufen, wenn innerhalb des Stille-Intervalls kein Frame kam
    fn stille_schreiben(&mut self, _samples: u32) -> Result<(), SessionFehler> {
        Ok(())
    }

    /// Letzter Aufruf vor dem Beenden des Workers
    fn abschliessen(&mut self) -> Result<(), SessionFehler> {
        Ok(())
    }
}

impl<T: FrameSenke + ?Sized> FrameSenke for Box<T> {
    fn frame_schreiben(&mut self, frame: &Frame) -> Result<(), SessionFehler> {
        (**self).frame_schreiben(frame)
    }

    fn stille_schreiben(&mut self, samples: u32) -> Result<(), SessionFehler> {
        (**self).stille_schreiben(samples)
    }

    fn abschliessen(&mut self) -> Result<(), SessionFehler> {
        (**self).abschliessen()
    }
}

/// Verwirft alle Frames (Modus `verwerfen`)
#[derive(Debug, Default)]
pub struct NullSenke {
    frames: u64,
}

impl FrameSenke for NullSenke {
    fn frame_schreiben(&mut self, frame: &Frame) -> Result<(), SessionFehler> {
        self.frames += 1;
        trace!(stream_key = %frame.stream_key, sequenz = frame.sequenz, "Frame verworfen");
        Ok(())
    }

    fn abschliessen(&mut self) -> Result<(), SessionFehler> {
        trace!(frames = self.frames, "NullSenke beendet");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Parameter der Wiedergabe-Ausgabe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AusgabeConfig {
    /// Abtastrate in Hz
    pub abtastrate: u32,
    pub kanaele: u16,
    /// Kapazitaet der Frame-Warteschlange pro Session
    pub warteschlange: usize,
    /// Ohne Frame nach dieser Zeit schreibt der Worker Stille
    pub stille_intervall: Duration,
}

impl Default for AusgabeConfig {
    fn default() -> Self {
        Self {
            abtastrate: 48_000,
            kanaele: 2,
            warteschlange: 64,
            stille_intervall: Duration::from_millis(20),
        }
    }
}

impl AusgabeConfig {
    pub fn validieren(&self) -> Result<(), SessionFehler> {
        if self.warteschlange == 0 {
            return Err(SessionFehler::Ausgabe(
                "warteschlange muss mindestens 1 sein".into(),
            ));
        }
        if self.abtastrate == 0 || self.kanaele == 0 {
            return Err(SessionFehler::Ausgabe(
                "abtastrate und kanaele muessen groesser 0 sein".into(),
            ));
        }
        if self.stille_intervall.is_zero() {
            return Err(SessionFehler::Ausgabe(
                "stille_intervall muss groesser 0 sein".into(),
            ));
        }
        Ok(())
    }

    /// Samples pro Kanal, die ein Stille-Intervall abdeckt
    pub fn stille_samples(&self) -> u32 {
        let samples = u128::from(self.abtastrate) * self.stille_intervall.as_micros() / 1_000_000;
        u32::try_from(samples).unwrap_or(u32::MAX)
    }
}

// ---------------------------------------------------------------------------
// AusgabeKontext
// ---------------------------------------------------------------------------

/// Geteilter Kontext aller Wiedergabe-Sessions
#[derive(Debug)]
pub struct AusgabeKontext {
    config: AusgabeConfig,
    offene_sessions: AtomicUsize,
    geschlossen: AtomicBool,
}

impl AusgabeKontext {
    pub fn neu(config: AusgabeConfig) -> Result<Arc<Self>, SessionFehler> {
        config.validieren()?;
        info!(
            abtastrate = config.abtastrate,
            kanaele = config.kanaele,
            warteschlange = config.warteschlange,
            "Ausgabekontext erstellt"
        );
        Ok(Arc::new(Self {
            config,
            offene_sessions: AtomicUsize::new(0),
            geschlossen: AtomicBool::new(false),
        }))
    }

    pub fn config(&self) -> &AusgabeConfig {
        &self.config
    }

    pub fn offene_sessions(&self) -> usize {
        self.offene_sessions.load(Ordering::SeqCst)
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen.load(Ordering::SeqCst)
    }

    /// Gibt den Kontext frei. Noch offene Sessions laufen weiter, neue
    /// werden abgelehnt.
    pub fn schliessen(&self) {
        if self.geschlossen.swap(true, Ordering::SeqCst) {
            return;
        }
        let offen = self.offene_sessions();
        if offen > 0 {
            warn!(offen, "Ausgabekontext geschlossen, Sessions noch offen");
        } else {
            info!("Ausgabekontext geschlossen");
        }
    }

    /// Reserviert einen Session-Platz
    pub(crate) fn session_anmelden(&self) -> Result<(), SessionFehler> {
        if self.ist_geschlossen() {
            return Err(SessionFehler::Ausgabe("Ausgabekontext ist geschlossen".into()));
        }
        self.offene_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn session_abmelden(&self) {
        // Nie unter 0
        let _ = self
            .offene_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}
