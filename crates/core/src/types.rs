//! Identifikationstypen fuer Lauscher
//!
//! Newtype-Pattern, damit Teilnehmer-IDs und Stream-Keys zur Compilezeit
//! nicht verwechselt werden koennen.

use serde::{Deserialize, Serialize};

/// Externe Teilnehmer-ID (vom Gateway vergeben, z.B. eine Snowflake)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeilnehmerId(pub u64);

impl TeilnehmerId {
    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TeilnehmerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "teilnehmer:{}", self.0)
    }
}

/// Kurzlebiger Stream-Key (SSRC), mit dem eingehende Pakete markiert sind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey(pub u32);

impl StreamKey {
    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ssrc:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anzeige_formate() {
        assert_eq!(TeilnehmerId(42).to_string(), "teilnehmer:42");
        assert_eq!(StreamKey(7).to_string(), "ssrc:7");
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let id = TeilnehmerId(123_456_789);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "123456789");
        let zurueck: TeilnehmerId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, zurueck);

        let key: StreamKey = serde_json::from_str("7").unwrap();
        assert_eq!(key.inner(), 7);
    }
}
