//! Lauscher-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte; ohne Datei fehlt lediglich die abzuspielende Dump-Datei.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use lauscher_core::{StreamKey, TeilnehmerId, STANDARD_FRAME_TICKS};
use lauscher_observability::LogEinstellungen;
use lauscher_playback::{AusgabeConfig, AusgabeModus};
use lauscher_pool::PoolConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pool: PoolEinstellungen,
    pub ausgabe: AusgabeEinstellungen,
    pub wiedergabe: WiedergabeEinstellungen,
    pub logging: LogEinstellungen,
}

/// Session-Pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolEinstellungen {
    /// Maximale Anzahl Leerlauf-Sessions
    pub max_groesse: usize,
    /// Maximales Leerlauf-Alter in Millisekunden
    pub max_alter_ms: u64,
    /// Beim Start vorgewaermte Sessions
    pub vorwaermen: usize,
    /// Verdraengte Sessions schliessen (statt nur zu verwerfen)
    pub verdraengte_schliessen: bool,
}

impl Default for PoolEinstellungen {
    fn default() -> Self {
        Self {
            max_groesse: 1,
            max_alter_ms: 10_000,
            vorwaermen: 1,
            verdraengte_schliessen: true,
        }
    }
}

/// Ziel der abgespielten Frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AusgabeModusWahl {
    /// Eine Dump-Datei pro Session
    #[default]
    Dump,
    Verwerfen,
}

/// Wiedergabe-Ausgabe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AusgabeEinstellungen {
    pub modus: AusgabeModusWahl,
    /// Zielverzeichnis im Modus `dump`
    pub verzeichnis: PathBuf,
    /// Frame-Warteschlange pro Session
    pub warteschlange: usize,
    /// Stille-Intervall des Wiedergabe-Workers in Millisekunden
    pub stille_ms: u64,
    pub abtastrate: u32,
    pub kanaele: u16,
}

impl Default for AusgabeEinstellungen {
    fn default() -> Self {
        let standard = AusgabeConfig::default();
        Self {
            modus: AusgabeModusWahl::Dump,
            verzeichnis: PathBuf::from("aufnahmen"),
            warteschlange: standard.warteschlange,
            stille_ms: 20,
            abtastrate: standard.abtastrate,
            kanaele: standard.kanaele,
        }
    }
}

/// Abzuspielender Paketstrom (Dump-Datei) und sein Teilnehmer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WiedergabeEinstellungen {
    pub datei: Option<PathBuf>,
    pub teilnehmer: u64,
    pub stream_key: u32,
    /// Zeitstempel-Schritt pro Paket (48 kHz-Ticks)
    pub frame_ticks: u32,
}

impl Default for WiedergabeEinstellungen {
    fn default() -> Self {
        Self {
            datei: None,
            teilnehmer: 1,
            stream_key: 1,
            frame_ticks: STANDARD_FRAME_TICKS,
        }
    }
}

impl AppConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Wertebereiche, bevor etwas gestartet wird
    pub fn validieren(&self) -> anyhow::Result<()> {
        self.pool_config()
            .validieren()
            .context("Ungueltige [pool]-Sektion")?;
        self.ausgabe_config()
            .validieren()
            .context("Ungueltige [ausgabe]-Sektion")?;
        if self.wiedergabe.frame_ticks == 0 {
            bail!("[wiedergabe] frame_ticks muss groesser 0 sein");
        }
        self.logging
            .filter()
            .context("Ungueltige [logging]-Sektion")?;
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        let mut config = PoolConfig::neu(
            self.pool.max_groesse,
            Duration::from_millis(self.pool.max_alter_ms),
        );
        config.verdraengte_schliessen = self.pool.verdraengte_schliessen;
        config
    }

    pub fn ausgabe_config(&self) -> AusgabeConfig {
        AusgabeConfig {
            abtastrate: self.ausgabe.abtastrate,
            kanaele: self.ausgabe.kanaele,
            warteschlange: self.ausgabe.warteschlange,
            stille_intervall: Duration::from_millis(self.ausgabe.stille_ms),
        }
    }

    pub fn ausgabe_modus(&self) -> AusgabeModus {
        match self.ausgabe.modus {
            AusgabeModusWahl::Dump => AusgabeModus::Dump(self.ausgabe.verzeichnis.clone()),
            AusgabeModusWahl::Verwerfen => AusgabeModus::Verwerfen,
        }
    }

    pub fn teilnehmer(&self) -> TeilnehmerId {
        TeilnehmerId(self.wiedergabe.teilnehmer)
    }

    pub fn stream_key(&self) -> StreamKey {
        StreamKey(self.wiedergabe.stream_key)
    }
}
