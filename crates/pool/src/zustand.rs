//! Erstellungs-Zustand und Statistik des Pools

use std::sync::Arc;

use lauscher_core::SessionFehler;

/// Ergebnis der letzten Session-Erstellung
///
/// `Beeintraechtigt` wird durch die naechste erfolgreiche Erstellung
/// (synchron oder im Hintergrund) wieder auf `Gesund` gesetzt.
#[derive(Debug, Clone, Default)]
pub enum ErstellZustand {
    #[default]
    Gesund,
    Beeintraechtigt(Arc<SessionFehler>),
}

impl ErstellZustand {
    pub fn ist_gesund(&self) -> bool {
        matches!(self, Self::Gesund)
    }

    /// Letzter Erstellungsfehler, falls beeintraechtigt
    pub fn fehler(&self) -> Option<&Arc<SessionFehler>> {
        match self {
            Self::Gesund => None,
            Self::Beeintraechtigt(e) => Some(e),
        }
    }
}

/// Momentaufnahme des Pool-Zustands
#[derive(Debug, Clone)]
pub struct PoolStatistik {
    /// Sessions im Leerlauf
    pub leerlauf: usize,
    /// Laufende Hintergrund-Erstellungen
    pub in_erstellung: usize,
    /// Konfigurierte Obergrenze
    pub max_groesse: usize,
    /// Ergebnis der letzten Erstellung
    pub erstell_zustand: ErstellZustand,
    /// Pool wurde gestoppt
    pub gestoppt: bool,
}

impl PoolStatistik {
    /// Gibt eine lesbare Zusammenfassung zurueck
    pub fn zusammenfassung(&self) -> String {
        let zustand = match &self.erstell_zustand {
            ErstellZustand::Gesund => "gesund".to_string(),
            ErstellZustand::Beeintraechtigt(e) => format!("beeintraechtigt ({e})"),
        };
        format!(
            "Pool: leerlauf={}/{} in_erstellung={} zustand={}{}",
            self.leerlauf,
            self.max_groesse,
            self.in_erstellung,
            zustand,
            if self.gestoppt { " [gestoppt]" } else { "" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zustand_standard_ist_gesund() {
        let z = ErstellZustand::default();
        assert!(z.ist_gesund());
        assert!(z.fehler().is_none());
    }

    #[test]
    fn beeintraechtigt_liefert_fehler() {
        let z = ErstellZustand::Beeintraechtigt(Arc::new(SessionFehler::Erstellung("x".into())));
        assert!(!z.ist_gesund());
        assert!(z.fehler().unwrap().to_string().contains("x"));
    }

    #[test]
    fn zusammenfassung_enthaelt_kennzahlen() {
        let s = PoolStatistik {
            leerlauf: 1,
            in_erstellung: 2,
            max_groesse: 4,
            erstell_zustand: ErstellZustand::Gesund,
            gestoppt: true,
        };
        let text = s.zusammenfassung();
        assert!(text.contains("leerlauf=1/4"));
        assert!(text.contains("in_erstellung=2"));
        assert!(text.contains("[gestoppt]"));
    }
}
