//! Session-Pool – begrenzte, alternde Menge wiederverwendbarer Sessions
//!
//! ## Ablauf
//!
//! ```text
//! holen()            -> Leerlauf-Session | Fabrik (synchron)
//! versuchen_holen()  -> Leerlauf-Session | Hintergrund-Erstellung planen + KeineSessionsVerfuegbar
//! zurueckgeben(s)    -> Leerlauf (falls Platz) | schliessen
//! fuellen(n)         -> min(n, max_groesse) Sessions synchron vorwaermen
//! stoppen()          -> Aufraeum-Thread beenden, alle Leerlauf-Sessions schliessen
//! ```
//!
//! ## Nebenlaeufigkeit
//! - Ein Mutex schuetzt Leerlauf-Menge, Erstellungs-Zaehler und Erstell-Zustand
//! - Die Fabrik wird nie unter dem Lock aufgerufen
//! - Aufraeumen laeuft auf einem eigenen Timer-Thread (Intervall `max_alter / 2`)
//! - Jede Hintergrund-Erstellung laeuft auf einem eigenen Worker-Thread

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{select, tick, Receiver, Sender};
use lauscher_core::{PoolFehler, Session, SessionFehler, SessionVerleih};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::PoolConfig;
use crate::zustand::{ErstellZustand, PoolStatistik};

/// Erzeugt eine neue Session
pub type SessionFabrik<S> = Arc<dyn Fn() -> Result<S, SessionFehler> + Send + Sync>;

// ---------------------------------------------------------------------------
// Interner Zustand
// ---------------------------------------------------------------------------

struct LeerlaufEintrag<S> {
    session: S,
    /// Zeitpunkt der Rueckgabe an den Pool
    zurueckgegeben: Instant,
}

struct PoolZustand<S> {
    leerlauf: Vec<LeerlaufEintrag<S>>,
    in_erstellung: usize,
    erstell_zustand: ErstellZustand,
    gestoppt: bool,
}

struct PoolInner<S> {
    config: PoolConfig,
    fabrik: SessionFabrik<S>,
    zustand: Mutex<PoolZustand<S>>,
}

impl<S: Session + 'static> PoolInner<S> {
    fn abgelaufen(&self, eintrag: &LeerlaufEintrag<S>, jetzt: Instant) -> bool {
        eintrag
            .zurueckgegeben
            .checked_add(self.config.max_alter)
            .is_some_and(|ablauf| ablauf < jetzt)
    }

    /// Entnimmt die zuletzt zurueckgegebene, noch gueltige Session.
    /// Dabei gefundene abgelaufene Eintraege landen in `verdraengt`.
    fn juengste_gueltige(
        &self,
        zustand: &mut PoolZustand<S>,
        jetzt: Instant,
        verdraengt: &mut Vec<S>,
    ) -> Option<S> {
        while let Some(eintrag) = zustand.leerlauf.pop() {
            if self.abgelaufen(&eintrag, jetzt) {
                verdraengt.push(eintrag.session);
            } else {
                return Some(eintrag.session);
            }
        }
        None
    }

    /// Entfernt alle Leerlauf-Sessions, deren Rueckgabe + `max_alter` vor `jetzt` liegt
    fn aufraeumen(&self, jetzt: Instant) -> usize {
        let verdraengt: Vec<S> = {
            let mut zustand = self.zustand.lock();
            let (behalten, weg): (Vec<_>, Vec<_>) = zustand
                .leerlauf
                .drain(..)
                .partition(|eintrag| !self.abgelaufen(eintrag, jetzt));
            zustand.leerlauf = behalten;
            weg.into_iter().map(|eintrag| eintrag.session).collect()
        };

        let anzahl = verdraengt.len();
        if anzahl > 0 {
            debug!(
                anzahl,
                schliessen = self.config.verdraengte_schliessen,
                "Leerlauf-Sessions verdraengt"
            );
        }
        self.verdraengte_entsorgen(verdraengt);
        anzahl
    }

    fn verdraengte_entsorgen(&self, verdraengt: Vec<S>) {
        if self.config.verdraengte_schliessen {
            for session in &verdraengt {
                schliessen_protokolliert(session, "verdraengt");
            }
        }
    }

    /// Verbucht das Ergebnis einer Hintergrund-Erstellung
    fn erstellung_abschliessen(&self, ergebnis: Result<S, SessionFehler>) {
        let ueberschuss = {
            let mut zustand = self.zustand.lock();
            zustand.in_erstellung = zustand.in_erstellung.saturating_sub(1);

            match ergebnis {
                Ok(session) => {
                    zustand.erstell_zustand = ErstellZustand::Gesund;
                    if !zustand.gestoppt && zustand.leerlauf.len() < self.config.max_groesse {
                        zustand.leerlauf.push(LeerlaufEintrag {
                            session,
                            zurueckgegeben: Instant::now(),
                        });
                        None
                    } else {
                        Some(session)
                    }
                }
                Err(e) => {
                    debug!(fehler = %e, "Hintergrund-Erstellung fehlgeschlagen");
                    zustand.erstell_zustand = ErstellZustand::Beeintraechtigt(Arc::new(e));
                    None
                }
            }
        };

        if let Some(session) = ueberschuss {
            schliessen_protokolliert(&session, "ueberschuss");
        }
    }
}

fn schliessen_protokolliert<S: Session>(session: &S, grund: &'static str) {
    if let Err(e) = session.schliessen() {
        warn!(fehler = %e, grund, "Session konnte nicht geschlossen werden");
    }
}

fn aufraeumer_starten<S: Session + 'static>(
    inner: Arc<PoolInner<S>>,
    stopp_rx: Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    let intervall = inner.config.aufraeum_intervall();

    thread::Builder::new()
        .name("lauscher-pool-gc".to_string())
        .spawn(move || {
            let ticker = tick(intervall);
            loop {
                select! {
                    // Sender gedroppt -> Pool wird gestoppt
                    recv(stopp_rx) -> _ => break,
                    recv(ticker) -> jetzt => match jetzt {
                        Ok(jetzt) => {
                            inner.aufraeumen(jetzt);
                        }
                        Err(_) => break,
                    },
                }
            }
            debug!("Aufraeum-Thread beendet");
        })
}

// ---------------------------------------------------------------------------
// SessionPool
// ---------------------------------------------------------------------------

/// Begrenzter Pool wiederverwendbarer Sessions
///
/// Thread-safe; wird ueblicherweise in einem `Arc` geteilt. Beim Drop wird
/// der Pool gestoppt.
pub struct SessionPool<S: Session + 'static> {
    inner: Arc<PoolInner<S>>,
    stopp_tx: Mutex<Option<Sender<()>>>,
    aufraeumer: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Session + 'static> SessionPool<S> {
    /// Erstellt den Pool und startet den Aufraeum-Thread
    pub fn neu<F>(config: PoolConfig, fabrik: F) -> Result<Self, PoolFehler>
    where
        F: Fn() -> Result<S, SessionFehler> + Send + Sync + 'static,
    {
        config.validieren()?;

        let inner = Arc::new(PoolInner {
            config,
            fabrik: Arc::new(fabrik),
            zustand: Mutex::new(PoolZustand {
                leerlauf: Vec::new(),
                in_erstellung: 0,
                erstell_zustand: ErstellZustand::Gesund,
                gestoppt: false,
            }),
        });

        let (stopp_tx, stopp_rx) = crossbeam_channel::bounded::<()>(1);
        let aufraeumer = aufraeumer_starten(Arc::clone(&inner), stopp_rx)
            .map_err(|e| PoolFehler::from(SessionFehler::Io(e)))?;

        info!(
            max_groesse = inner.config.max_groesse,
            max_alter_ms = inner.config.max_alter.as_millis() as u64,
            "Session-Pool gestartet"
        );

        Ok(Self {
            inner,
            stopp_tx: Mutex::new(Some(stopp_tx)),
            aufraeumer: Mutex::new(Some(aufraeumer)),
        })
    }

    /// Gibt eine Leerlauf-Session zurueck oder erstellt synchron eine neue.
    ///
    /// Schlaegt nie wegen eines vollen Pools fehl, nur wenn die Fabrik
    /// fehlschlaegt oder der Pool gestoppt ist.
    pub fn holen(&self) -> Result<S, PoolFehler> {
        let jetzt = Instant::now();
        let mut verdraengt = Vec::new();
        let gefunden = {
            let mut zustand = self.inner.zustand.lock();
            if zustand.gestoppt {
                return Err(PoolFehler::KeineSessionsVerfuegbar);
            }
            self.inner.juengste_gueltige(&mut zustand, jetzt, &mut verdraengt)
        };
        self.inner.verdraengte_entsorgen(verdraengt);

        if let Some(session) = gefunden {
            trace!("Leerlauf-Session ausgeliehen");
            return Ok(session);
        }

        let session = (self.inner.fabrik)()?;
        self.inner.zustand.lock().erstell_zustand = ErstellZustand::Gesund;
        trace!("Session synchron erstellt");
        Ok(session)
    }

    /// Gibt eine Leerlauf-Session zurueck, ohne synchron zu erstellen.
    ///
    /// Ist keine vorhanden, wird (sofern weniger als `max_groesse`
    /// Erstellungen laufen) eine Hintergrund-Erstellung gestartet und
    /// sofort `KeineSessionsVerfuegbar` geliefert.
    pub fn versuchen_holen(&self) -> Result<S, PoolFehler> {
        let jetzt = Instant::now();
        let mut verdraengt = Vec::new();
        let (gefunden, planen) = {
            let mut zustand = self.inner.zustand.lock();
            if zustand.gestoppt {
                return Err(PoolFehler::KeineSessionsVerfuegbar);
            }
            let gefunden = self.inner.juengste_gueltige(&mut zustand, jetzt, &mut verdraengt);
            let planen =
                gefunden.is_none() && zustand.in_erstellung < self.inner.config.max_groesse;
            if planen {
                zustand.in_erstellung += 1;
            }
            (gefunden, planen)
        };
        self.inner.verdraengte_entsorgen(verdraengt);

        if let Some(session) = gefunden {
            return Ok(session);
        }
        if planen {
            self.erstellung_planen();
        }
        Err(PoolFehler::KeineSessionsVerfuegbar)
    }

    /// Startet eine Hintergrund-Erstellung. Der Zaehler wurde bereits erhoeht.
    fn erstellung_planen(&self) {
        let inner = Arc::clone(&self.inner);
        let gestartet = thread::Builder::new()
            .name("lauscher-pool-erstellung".to_string())
            .spawn(move || {
                let ergebnis = (inner.fabrik)();
                inner.erstellung_abschliessen(ergebnis);
            });

        if let Err(e) = gestartet {
            self.inner.erstellung_abschliessen(Err(SessionFehler::Io(e)));
        }
    }

    /// Gibt eine Session an den Pool zurueck.
    ///
    /// Ist der Pool voll oder gestoppt, wird die Session sofort geschlossen.
    /// Pro ausgeliehener Session entweder `zurueckgeben` ODER `schliessen`.
    pub fn zurueckgeben(&self, session: S) {
        {
            let mut zustand = self.inner.zustand.lock();
            if !zustand.gestoppt && zustand.leerlauf.len() < self.inner.config.max_groesse {
                zustand.leerlauf.push(LeerlaufEintrag {
                    session,
                    zurueckgegeben: Instant::now(),
                });
                return;
            }
        }
        schliessen_protokolliert(&session, "pool voll oder gestoppt");
    }

    /// Waermt den Pool mit bis zu `min(n, max_groesse)` Sessions vor.
    ///
    /// Der erste Fabrik-Fehler bricht ab; bereits erstellte Sessions werden
    /// trotzdem eingelagert. Gibt die Anzahl eingelagerter Sessions zurueck.
    pub fn fuellen(&self, n: usize) -> Result<usize, PoolFehler> {
        let n = n.min(self.inner.config.max_groesse);

        let mut erstellt = Vec::with_capacity(n);
        let mut fehler = None;
        for _ in 0..n {
            match (self.inner.fabrik)() {
                Ok(session) => erstellt.push(session),
                Err(e) => {
                    fehler = Some(e);
                    break;
                }
            }
        }

        let jetzt = Instant::now();
        let mut ueberschuss = Vec::new();
        let eingelagert = {
            let mut zustand = self.inner.zustand.lock();
            if !erstellt.is_empty() {
                zustand.erstell_zustand = ErstellZustand::Gesund;
            }
            let mut anzahl = 0;
            for session in erstellt {
                if !zustand.gestoppt && zustand.leerlauf.len() < self.inner.config.max_groesse {
                    zustand.leerlauf.push(LeerlaufEintrag {
                        session,
                        zurueckgegeben: jetzt,
                    });
                    anzahl += 1;
                } else {
                    ueberschuss.push(session);
                }
            }
            anzahl
        };

        for session in &ueberschuss {
            schliessen_protokolliert(session, "ueberschuss");
        }

        match fehler {
            Some(e) => Err(e.into()),
            None => {
                debug!(eingelagert, angefordert = n, "Pool vorgewaermt");
                Ok(eingelagert)
            }
        }
    }

    /// Stoppt den Aufraeum-Thread und schliesst alle Leerlauf-Sessions.
    ///
    /// Idempotent. Danach liefern alle Ausleihen `KeineSessionsVerfuegbar`
    /// und `zurueckgeben` schliesst sein Argument.
    pub fn stoppen(&self) {
        {
            let mut zustand = self.inner.zustand.lock();
            if zustand.gestoppt {
                return;
            }
            zustand.gestoppt = true;
        }

        drop(self.stopp_tx.lock().take());
        if let Some(handle) = self.aufraeumer.lock().take() {
            if handle.join().is_err() {
                warn!("Aufraeum-Thread ist abgestuerzt");
            }
        }

        let sessions: Vec<S> = self
            .inner
            .zustand
            .lock()
            .leerlauf
            .drain(..)
            .map(|eintrag| eintrag.session)
            .collect();

        for session in &sessions {
            schliessen_protokolliert(session, "pool gestoppt");
        }

        info!(geschlossen = sessions.len(), "Session-Pool gestoppt");
    }

    /// Momentaufnahme fuer Logging und Tests
    pub fn statistik(&self) -> PoolStatistik {
        let zustand = self.inner.zustand.lock();
        PoolStatistik {
            leerlauf: zustand.leerlauf.len(),
            in_erstellung: zustand.in_erstellung,
            max_groesse: self.inner.config.max_groesse,
            erstell_zustand: zustand.erstell_zustand.clone(),
            gestoppt: zustand.gestoppt,
        }
    }

    /// Ergebnis der letzten Erstellung
    pub fn erstell_zustand(&self) -> ErstellZustand {
        self.inner.zustand.lock().erstell_zustand.clone()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl<S: Session + 'static> Drop for SessionPool<S> {
    fn drop(&mut self) {
        self.stoppen();
    }
}

impl<S: Session + 'static> SessionVerleih for SessionPool<S> {
    type Session = S;

    fn holen(&self) -> Result<S, PoolFehler> {
        SessionPool::holen(self)
    }

    fn versuchen_holen(&self) -> Result<S, PoolFehler> {
        SessionPool::versuchen_holen(self)
    }

    fn zurueckgeben(&self, session: S) {
        SessionPool::zurueckgeben(self, session)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
