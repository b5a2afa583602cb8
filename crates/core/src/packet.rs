//! Eingehendes Datenpaket
//!
//! Die Nutzdaten liegen als `Bytes` vor, damit Paketquelle und Session
//! ohne Kopie auskommen.

use bytes::Bytes;

use crate::types::StreamKey;

/// Standard-Frame-Laenge in 48 kHz-Ticks (20 ms)
pub const STANDARD_FRAME_TICKS: u32 = 960;

/// Ein getaggtes Paket aus der Paketquelle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paket {
    /// Stream-Key des Absenders
    pub stream_key: StreamKey,
    /// Sequenznummer (laeuft bei u16::MAX ueber)
    pub sequenz: u16,
    /// Zeitstempel in 48 kHz-Ticks
    pub zeitstempel: u32,
    /// Komprimierte Nutzdaten
    pub nutzdaten: Bytes,
}

impl Paket {
    /// Erstellt ein neues Paket
    pub fn neu(stream_key: StreamKey, sequenz: u16, zeitstempel: u32, nutzdaten: impl Into<Bytes>) -> Self {
        Self {
            stream_key,
            sequenz,
            zeitstempel,
            nutzdaten: nutzdaten.into(),
        }
    }
}
