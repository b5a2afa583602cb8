//! Pool-Konfiguration

use std::time::Duration;

use lauscher_core::PoolFehler;
use serde::{Deserialize, Serialize};

/// Kleinstes erlaubtes Aufraeum-Intervall
const MIN_AUFRAEUM_INTERVALL: Duration = Duration::from_millis(1);

/// Konfiguration fuer den Session-Pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Obergrenze fuer Leerlauf-Sessions und gleichzeitige Hintergrund-Erstellungen
    pub max_groesse: usize,
    /// Nach dieser Leerlaufzeit wird eine Session verdraengt
    pub max_alter: Duration,
    /// Verdraengte Sessions schliessen (sonst nur aus dem Pool entfernen)
    pub verdraengte_schliessen: bool,
}

impl PoolConfig {
    /// Erstellt eine Konfiguration; verdraengte Sessions werden geschlossen
    pub fn neu(max_groesse: usize, max_alter: Duration) -> Self {
        Self {
            max_groesse,
            max_alter,
            verdraengte_schliessen: true,
        }
    }

    /// Prueft die Werte vor dem Start des Pools
    pub fn validieren(&self) -> Result<(), PoolFehler> {
        if self.max_groesse == 0 {
            return Err(PoolFehler::Konfiguration(
                "max_groesse muss mindestens 1 sein".into(),
            ));
        }
        if self.max_alter.is_zero() {
            return Err(PoolFehler::Konfiguration(
                "max_alter muss groesser als 0 sein".into(),
            ));
        }
        Ok(())
    }

    /// Der Aufraeum-Timer laeuft mit halbem `max_alter`, damit eine Session
    /// hoechstens 1,5 × `max_alter` im Leerlauf verbleibt.
    pub fn aufraeum_intervall(&self) -> Duration {
        (self.max_alter / 2).max(MIN_AUFRAEUM_INTERVALL)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::neu(1, Duration::from_secs(10))
    }
}
