//! lauscher-app – Bibliotheks-Root
//!
//! Baut Ausgabekontext, Session-Pool, Ereignis-Hub und Router zusammen und
//! stellt den Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::AppConfig;
use lauscher_core::{EreignisHub, TeilnehmerEreignis};
use lauscher_playback::{
    wiedergabe_fabrik, AusgabeKontext, AusgabeModus, DumpQuelle, WiedergabeSession,
};
use lauscher_pool::SessionPool;
use lauscher_router::StreamRouter;
use tracing::{info, warn};

/// Pool der Wiedergabe-Sessions
pub type WiedergabePool = SessionPool<Arc<WiedergabeSession>>;
/// Router ueber dem geteilten Pool
pub type WiedergabeRouter = StreamRouter<Arc<WiedergabePool>>;

/// Haelt alle laufenden Komponenten zusammen
pub struct App {
    config: AppConfig,
    kontext: Arc<AusgabeKontext>,
    pool: Arc<WiedergabePool>,
    hub: EreignisHub,
    router: Arc<WiedergabeRouter>,
}

impl App {
    /// Erstellt alle Komponenten in Abhaengigkeitsreihenfolge
    ///
    /// 1. Ausgabekontext (geteilt von allen Sessions)
    /// 2. Session-Pool, vorgewaermt mit `vorwaermen` Sessions
    /// 3. Ereignis-Hub und Router (abonniert den Hub)
    pub fn neu(config: AppConfig) -> Result<Self> {
        config.validieren()?;

        let modus = config.ausgabe_modus();
        if let AusgabeModus::Dump(verzeichnis) = &modus {
            std::fs::create_dir_all(verzeichnis).with_context(|| {
                format!("Ausgabeverzeichnis '{}' nicht anlegbar", verzeichnis.display())
            })?;
        }

        let kontext = AusgabeKontext::neu(config.ausgabe_config())
            .context("Ausgabekontext konnte nicht erstellt werden")?;

        let pool = Arc::new(
            SessionPool::neu(
                config.pool_config(),
                wiedergabe_fabrik(Arc::clone(&kontext), modus),
            )
            .context("Session-Pool konnte nicht erstellt werden")?,
        );
        let vorgewaermt = pool
            .fuellen(config.pool.vorwaermen)
            .context("Session-Pool konnte nicht vorgewaermt werden")?;

        let hub = EreignisHub::neu();
        let router = StreamRouter::mit_quelle(Arc::clone(&pool), &hub);

        info!(
            vorgewaermt,
            max_groesse = config.pool.max_groesse,
            "Lauscher initialisiert"
        );

        Ok(Self {
            config,
            kontext,
            pool,
            hub,
            router,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<WiedergabePool> {
        &self.pool
    }

    pub fn router(&self) -> &Arc<WiedergabeRouter> {
        &self.router
    }

    /// Hub, ueber den Teilnehmer-Ereignisse eingespeist werden
    pub fn hub(&self) -> &EreignisHub {
        &self.hub
    }

    /// Oeffnet die konfigurierte Dump-Datei als Paketquelle
    pub fn quelle_oeffnen(&self) -> Result<DumpQuelle> {
        let Some(datei) = &self.config.wiedergabe.datei else {
            anyhow::bail!("Keine Paketquelle konfiguriert ([wiedergabe] datei fehlt)");
        };
        DumpQuelle::oeffnen(
            datei,
            self.config.stream_key(),
            self.config.wiedergabe.frame_ticks,
        )
        .with_context(|| format!("Dump-Datei '{}' nicht lesbar", datei.display()))
    }

    /// Spielt die Paketquelle ab, bis sie endet oder Ctrl-C kommt.
    ///
    /// Stream-Ende ist ein regulaeres Ende; jeder andere Abbruch der
    /// Dispatch-Schleife wird als Fehler zurueckgegeben.
    pub async fn starten(self) -> Result<()> {
        let mut quelle = match self.quelle_oeffnen() {
            Ok(quelle) => quelle,
            Err(e) => {
                self.herunterfahren();
                return Err(e);
            }
        };

        self.hub.senden(TeilnehmerEreignis::Verbunden {
            teilnehmer: self.config.teilnehmer(),
            stream_key: self.config.stream_key(),
        });

        let router = Arc::clone(&self.router);
        let mut dispatch = tokio::task::spawn_blocking(move || router.starten(&mut quelle));

        info!("Lauscher laeuft. Warte auf Stream-Ende oder Shutdown-Signal (Ctrl-C)...");
        let ergebnis = tokio::select! {
            beendet = &mut dispatch => beendet
                .context("Dispatch-Thread abgebrochen")?
                .map_err(anyhow::Error::from),
            signal = tokio::signal::ctrl_c() => {
                signal.context("Shutdown-Signal nicht empfangbar")?;
                info!("Shutdown-Signal empfangen, Lauscher wird beendet");
                self.router.schliessen();
                Ok(())
            }
        };

        self.herunterfahren();
        ergebnis.context("Wiedergabe abgebrochen")
    }

    /// Schliesst Router, Pool und Ausgabekontext (in dieser Reihenfolge)
    pub fn herunterfahren(&self) {
        self.router.schliessen();
        let router = self.router.statistik();
        self.pool.stoppen();
        self.kontext.schliessen();

        if router.schreibfehler > 0 {
            warn!(schreibfehler = router.schreibfehler, "Wiedergabe mit Schreibfehlern beendet");
        }
        info!(
            router = %router.zusammenfassung(),
            pool = %self.pool.statistik().zusammenfassung(),
            "Lauscher heruntergefahren"
        );
    }
}
