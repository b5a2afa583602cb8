//! WiedergabeSession – Session mit eigenem Ausgabe-Worker
//!
//! ```text
//! schreiben(paket) -> SequenzFilter -> [begrenzte Warteschlange] -> Worker -> FrameSenke
//!                                                   recv_timeout -> stille_schreiben
//! ```
//!
//! Fehler der Senke beenden den Worker und werden beim naechsten
//! `schreiben` gemeldet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender};
use lauscher_core::{Paket, Session, SessionFehler};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::ausgabe::{AusgabeKontext, Frame, FrameSenke};
use crate::sequenz::SequenzFilter;

struct SessionInner {
    filter: SequenzFilter,
    frame_tx: Option<Sender<Frame>>,
    worker: Option<JoinHandle<()>>,
}

/// Wiedergabe-Session ueber einer beliebigen [`FrameSenke`]
pub struct WiedergabeSession {
    inner: Mutex<SessionInner>,
    fehler_rx: Receiver<SessionFehler>,
    kontext: Arc<AusgabeKontext>,
    geschlossen: AtomicBool,
}

impl WiedergabeSession {
    /// Startet den Worker-Thread der Session
    pub fn neu<S: FrameSenke>(
        kontext: Arc<AusgabeKontext>,
        senke: S,
    ) -> Result<Self, SessionFehler> {
        kontext.session_anmelden()?;

        let config = kontext.config();
        let (frame_tx, frame_rx) = bounded::<Frame>(config.warteschlange);
        let (fehler_tx, fehler_rx) = bounded::<SessionFehler>(1);
        let intervall = config.stille_intervall;
        let stille_samples = config.stille_samples();

        let worker = thread::Builder::new()
            .name("lauscher-wiedergabe".to_string())
            .spawn(move || {
                worker_schleife(senke, frame_rx, fehler_tx, intervall, stille_samples);
            });

        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                kontext.session_abmelden();
                return Err(SessionFehler::Io(e));
            }
        };

        Ok(Self {
            inner: Mutex::new(SessionInner {
                filter: SequenzFilter::default(),
                frame_tx: Some(frame_tx),
                worker: Some(worker),
            }),
            fehler_rx,
            kontext,
            geschlossen: AtomicBool::new(false),
        })
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen.load(Ordering::SeqCst)
    }

    /// Anzahl vom Sequenzfilter verworfener Pakete
    pub fn verworfen(&self) -> u64 {
        self.inner.lock().filter.verworfen()
    }
}

fn worker_schleife<S: FrameSenke>(
    mut senke: S,
    frame_rx: Receiver<Frame>,
    fehler_tx: Sender<SessionFehler>,
    intervall: std::time::Duration,
    stille_samples: u32,
) {
    loop {
        let ergebnis = match frame_rx.recv_timeout(intervall) {
            Ok(frame) => senke.frame_schreiben(&frame),
            Err(RecvTimeoutError::Timeout) => senke.stille_schreiben(stille_samples),
            // Session geschlossen
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if let Err(e) = ergebnis {
            debug!(fehler = %e, "Wiedergabe-Worker bricht ab");
            let _ = fehler_tx.try_send(e);
            break;
        }
    }

    if let Err(e) = senke.abschliessen() {
        warn!(fehler = %e, "Senke konnte nicht abgeschlossen werden");
    }
    trace!("Wiedergabe-Worker beendet");
}

impl Session for WiedergabeSession {
    fn schreiben(&self, paket: &Paket) -> Result<(), SessionFehler> {
        if self.ist_geschlossen() {
            return Err(SessionFehler::Geschlossen);
        }

        let mut inner = self.inner.lock();
        let Some(frame) = inner.filter.pruefen(paket) else {
            trace!(stream_key = %paket.stream_key, sequenz = paket.sequenz, "Veraltetes Paket verworfen");
            return Ok(());
        };
        let Some(frame_tx) = inner.frame_tx.as_ref() else {
            return Err(SessionFehler::Geschlossen);
        };

        // Blockiert bei voller Warteschlange, bis der Worker aufholt oder ausfaellt
        select! {
            send(frame_tx, frame) -> ergebnis => ergebnis.map_err(|_| {
                // Worker beendet; Fehler wurde ggf. schon gemeldet
                self.fehler_rx
                    .try_recv()
                    .unwrap_or_else(|_| SessionFehler::Ausgabe("Wiedergabe-Worker beendet".into()))
            }),
            recv(self.fehler_rx) -> fehler => Err(fehler.unwrap_or_else(|_| {
                SessionFehler::Ausgabe("Wiedergabe-Worker beendet".into())
            })),
        }
    }

    /// Beendet den Worker und wartet auf ihn. Mehrfacher Aufruf ist harmlos.
    fn schliessen(&self) -> Result<(), SessionFehler> {
        if self.geschlossen.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let worker = {
            let mut inner = self.inner.lock();
            // Sender droppen -> Worker leert die Warteschlange und endet
            inner.frame_tx.take();
            inner.worker.take()
        };
        self.kontext.session_abmelden();

        if let Some(worker) = worker {
            worker
                .join()
                .map_err(|_| SessionFehler::Ausgabe("Wiedergabe-Worker ist abgestuerzt".into()))?;
        }
        Ok(())
    }
}

impl Drop for WiedergabeSession {
    fn drop(&mut self) {
        if let Err(e) = Session::schliessen(self) {
            warn!(fehler = %e, "Session beim Drop nicht sauber geschlossen");
        }
    }
}
