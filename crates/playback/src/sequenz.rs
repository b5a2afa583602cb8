//! Sequenzfilter – verwirft veraltete Pakete und bestimmt die Frame-Laenge
//!
//! Pro Session wird die letzte akzeptierte Sequenznummer und der letzte
//! Zeitstempel gemerkt. Ein Paket wird nur akzeptiert, wenn seine
//! Sequenznummer (mit Wrap-Around) neuer ist. Die Frame-Laenge in Samples
//! ergibt sich aus der Zeitstempel-Differenz zum Vorgaenger.

use lauscher_core::{Paket, StreamKey, STANDARD_FRAME_TICKS};

use crate::ausgabe::Frame;

#[derive(Debug, Clone, Copy)]
struct Letztes {
    stream_key: StreamKey,
    sequenz: u16,
    zeitstempel: u32,
}

/// Zustand des Filters einer einzelnen Session
#[derive(Debug, Clone)]
pub struct SequenzFilter {
    letztes: Option<Letztes>,
    standard_ticks: u32,
    verworfen: u64,
}

impl Default for SequenzFilter {
    fn default() -> Self {
        Self::neu(STANDARD_FRAME_TICKS)
    }
}

impl SequenzFilter {
    /// `standard_ticks` gilt fuer das erste Paket eines Streams
    pub fn neu(standard_ticks: u32) -> Self {
        Self {
            letztes: None,
            standard_ticks: standard_ticks.max(1),
            verworfen: 0,
        }
    }

    /// Prueft ein Paket und liefert den Frame, falls es neuer ist.
    ///
    /// Wechselt der Stream-Key (Session wurde an einen anderen Teilnehmer
    /// verliehen), beginnt die Zaehlung neu.
    pub fn pruefen(&mut self, paket: &Paket) -> Option<Frame> {
        let samples = match self.letztes {
            Some(letztes) if letztes.stream_key == paket.stream_key => {
                if !ist_neuer(paket.sequenz, letztes.sequenz) {
                    self.verworfen += 1;
                    return None;
                }
                match paket.zeitstempel.wrapping_sub(letztes.zeitstempel) {
                    0 => self.standard_ticks,
                    delta => delta,
                }
            }
            _ => self.standard_ticks,
        };

        self.letztes = Some(Letztes {
            stream_key: paket.stream_key,
            sequenz: paket.sequenz,
            zeitstempel: paket.zeitstempel,
        });

        Some(Frame {
            stream_key: paket.stream_key,
            sequenz: paket.sequenz,
            samples,
            nutzdaten: paket.nutzdaten.clone(),
        })
    }

    /// Anzahl verworfener (doppelter oder veralteter) Pakete
    pub fn verworfen(&self) -> u64 {
        self.verworfen
    }

    pub fn zuruecksetzen(&mut self) {
        self.letztes = None;
    }
}

/// `seq` liegt (mit Wrap-Around) echt nach `referenz`
fn ist_neuer(seq: u16, referenz: u16) -> bool {
    let diff = seq.wrapping_sub(referenz);
    diff != 0 && diff < u16::MAX / 2
}
