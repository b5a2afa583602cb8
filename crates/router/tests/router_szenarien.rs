//! Szenario-Tests fuer den StreamRouter

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use lauscher_core::{
    EreignisHub, Paket, PaketQuelle, PaketQuellenFehler, PoolFehler, Session, SessionFehler,
    SessionVerleih, StreamKey, TeilnehmerEreignis, TeilnehmerId,
};
use lauscher_pool::{PoolConfig, SessionPool};
use lauscher_router::{RouterFehler, StreamRouter};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Hilfstypen
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Aufnahme {
    id: usize,
    sequenzen: Mutex<Vec<u16>>,
    schreibfehler: AtomicBool,
    schliessungen: AtomicUsize,
}

impl Session for Aufnahme {
    fn schreiben(&self, paket: &Paket) -> Result<(), SessionFehler> {
        if self.schreibfehler.load(Ordering::SeqCst) {
            return Err(SessionFehler::Schreiben("Senke voll".into()));
        }
        self.sequenzen.lock().push(paket.sequenz);
        Ok(())
    }

    fn schliessen(&self) -> Result<(), SessionFehler> {
        self.schliessungen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Verleih, der jede Ausleihe und Rueckgabe pro Session zaehlt
#[derive(Default)]
struct ZaehlVerleih {
    ausgegeben: Mutex<Vec<Arc<Aufnahme>>>,
    rueckgaben: Mutex<HashMap<usize, usize>>,
    kaputt: AtomicBool,
    verzoegerung_ms: AtomicUsize,
}

impl ZaehlVerleih {
    fn ausleihen(&self) -> usize {
        self.ausgegeben.lock().len()
    }

    fn rueckgaben_von(&self, id: usize) -> usize {
        self.rueckgaben.lock().get(&id).copied().unwrap_or(0)
    }

    fn session(&self, id: usize) -> Arc<Aufnahme> {
        Arc::clone(&self.ausgegeben.lock()[id])
    }
}

impl SessionVerleih for ZaehlVerleih {
    type Session = Arc<Aufnahme>;

    fn holen(&self) -> Result<Arc<Aufnahme>, PoolFehler> {
        let ms = self.verzoegerung_ms.load(Ordering::SeqCst);
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms as u64));
        }
        if self.kaputt.load(Ordering::SeqCst) {
            return Err(PoolFehler::from(SessionFehler::Erstellung(
                "Dekoder nicht verfuegbar".into(),
            )));
        }
        let mut ausgegeben = self.ausgegeben.lock();
        let session = Arc::new(Aufnahme {
            id: ausgegeben.len(),
            ..Default::default()
        });
        ausgegeben.push(Arc::clone(&session));
        Ok(session)
    }

    fn versuchen_holen(&self) -> Result<Arc<Aufnahme>, PoolFehler> {
        Err(PoolFehler::KeineSessionsVerfuegbar)
    }

    fn zurueckgeben(&self, session: Arc<Aufnahme>) {
        *self.rueckgaben.lock().entry(session.id).or_insert(0) += 1;
    }
}

/// Paketquelle ueber einen Kanal; getrennter Sender -> Stream-Ende
struct KanalQuelle {
    rx: Receiver<Result<Paket, PaketQuellenFehler>>,
}

impl PaketQuelle for KanalQuelle {
    fn paket_lesen(&mut self) -> Result<Paket, PaketQuellenFehler> {
        self.rx.recv().unwrap_or(Err(PaketQuellenFehler::StreamEnde))
    }
}

fn kanal() -> (Sender<Result<Paket, PaketQuellenFehler>>, KanalQuelle) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (tx, KanalQuelle { rx })
}

fn paket(key: u32, seq: u16) -> Result<Paket, PaketQuellenFehler> {
    Ok(Paket::neu(StreamKey(key), seq, u32::from(seq) * 960, vec![0xAB; 8]))
}

fn router() -> StreamRouter<Arc<ZaehlVerleih>> {
    StreamRouter::neu(Arc::new(ZaehlVerleih::default()))
}

// ---------------------------------------------------------------------------
// Registrierung
// ---------------------------------------------------------------------------

#[test]
fn doppelte_aktivierung_leiht_genau_einmal_aus() {
    let r = router();
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();

    assert_eq!(r.verleih().ausleihen(), 1);
    assert_eq!(r.statistik().aktive_teilnehmer, 1);
}

#[test]
fn parallele_aktivierung_behaelt_genau_eine_session() {
    const THREADS: usize = 8;
    let r = Arc::new(router());
    r.verleih().verzoegerung_ms.store(20, Ordering::SeqCst);
    let barriere = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let r = Arc::clone(&r);
            let barriere = Arc::clone(&barriere);
            thread::spawn(move || {
                barriere.wait();
                r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7))
            })
        })
        .collect();

    for h in handles {
        assert!(h.join().unwrap().is_ok());
    }

    // Jede zusaetzlich geholte Session ging sofort an den Verleih zurueck
    let ausleihen = r.verleih().ausleihen();
    let rueckgaben: usize = r.verleih().rueckgaben.lock().values().sum();
    assert_eq!(ausleihen - rueckgaben, 1);
    assert_eq!(r.statistik().aktive_teilnehmer, 1);
}

#[test]
fn belegter_stream_key_wird_abgelehnt() {
    let r = router();
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();

    let fehler = r
        .teilnehmer_aktiv(TeilnehmerId(2), StreamKey(7))
        .unwrap_err();
    assert!(matches!(
        fehler,
        RouterFehler::StreamKeyBelegt {
            stream_key: StreamKey(7),
            besitzer: TeilnehmerId(1),
        }
    ));
    assert!(!fehler.ist_fatal());
    // Die zweite Session ging zurueck, der Router bleibt aktiv
    assert_eq!(r.verleih().rueckgaben_von(1), 1);
    assert!(r.teilnehmer_aktiv(TeilnehmerId(3), StreamKey(8)).is_ok());
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[test]
fn pakete_in_reihenfolge_und_nach_abmeldung_verworfen() {
    let r = Arc::new(router());
    r.teilnehmer_aktiv(TeilnehmerId(0xA), StreamKey(7)).unwrap();

    let (tx, mut quelle) = kanal();
    let r2 = Arc::clone(&r);
    let schleife = thread::spawn(move || r2.starten(&mut quelle));

    for seq in 1..=3 {
        tx.send(paket(7, seq)).unwrap();
    }
    let session = r.verleih().session(0);
    let start = std::time::Instant::now();
    while session.sequenzen.lock().len() < 3 && start.elapsed() < Duration::from_secs(2) {
        thread::sleep(Duration::from_millis(5));
    }

    r.teilnehmer_inaktiv(TeilnehmerId(0xA));
    tx.send(paket(7, 4)).unwrap();
    drop(tx);

    schleife.join().unwrap().unwrap();
    assert_eq!(*session.sequenzen.lock(), vec![1, 2, 3]);
    assert_eq!(r.statistik().verworfen, 1);
    assert_eq!(r.verleih().rueckgaben_von(0), 1);
}

#[test]
fn unbekannter_key_beeintraechtigt_andere_nicht() {
    let r = router();
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();
    r.teilnehmer_aktiv(TeilnehmerId(2), StreamKey(8)).unwrap();

    let (tx, mut quelle) = kanal();
    for p in [paket(7, 1), paket(99, 1), paket(8, 1), paket(99, 2), paket(7, 2)] {
        tx.send(p).unwrap();
    }
    drop(tx);

    r.starten(&mut quelle).unwrap();
    assert_eq!(*r.verleih().session(0).sequenzen.lock(), vec![1, 2]);
    assert_eq!(*r.verleih().session(1).sequenzen.lock(), vec![1]);

    let statistik = r.statistik();
    assert_eq!(statistik.zugestellt, 3);
    assert_eq!(statistik.verworfen, 2);
}

#[test]
fn schreibfehler_beendet_schleife_nicht() {
    let r = router();
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();
    r.teilnehmer_aktiv(TeilnehmerId(2), StreamKey(8)).unwrap();
    r.verleih().session(0).schreibfehler.store(true, Ordering::SeqCst);

    let (tx, mut quelle) = kanal();
    for p in [paket(7, 1), paket(8, 1), paket(7, 2), paket(8, 2)] {
        tx.send(p).unwrap();
    }
    drop(tx);

    r.starten(&mut quelle).unwrap();
    assert_eq!(*r.verleih().session(1).sequenzen.lock(), vec![1, 2]);
    assert_eq!(r.statistik().schreibfehler, 2);
    // Session blieb trotz Fehler registriert bis zum Ende
    assert_eq!(r.verleih().rueckgaben_von(0), 1);
}

#[test]
fn quellenfehler_beendet_und_raeumt_auf() {
    let r = router();
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();

    let (tx, mut quelle) = kanal();
    tx.send(paket(7, 1)).unwrap();
    tx.send(Err(PaketQuellenFehler::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "Verbindung getrennt",
    ))))
    .unwrap();

    let fehler = r.starten(&mut quelle).unwrap_err();
    assert!(matches!(fehler, RouterFehler::PaketQuelle(PaketQuellenFehler::Io(_))));
    assert!(r.ist_geschlossen());
    assert_eq!(r.verleih().rueckgaben_von(0), 1);
    assert_eq!(r.statistik().aktive_teilnehmer, 0);
}

#[test]
fn ausleihfehler_beendet_dispatch_beim_naechsten_paket() {
    let r = router();
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();
    r.verleih().kaputt.store(true, Ordering::SeqCst);
    assert!(matches!(
        r.teilnehmer_aktiv(TeilnehmerId(2), StreamKey(8)),
        Err(RouterFehler::Ausleihe(_))
    ));

    let (tx, mut quelle) = kanal();
    tx.send(paket(7, 1)).unwrap();
    tx.send(paket(7, 2)).unwrap();

    assert!(matches!(r.starten(&mut quelle), Err(RouterFehler::Ausleihe(_))));
    assert!(r.verleih().session(0).sequenzen.lock().is_empty());
    assert_eq!(r.verleih().rueckgaben_von(0), 1);
}

// ---------------------------------------------------------------------------
// Herunterfahren
// ---------------------------------------------------------------------------

#[test]
fn schliessen_gibt_jede_session_einmal_zurueck() {
    let r = router();
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();
    r.teilnehmer_aktiv(TeilnehmerId(2), StreamKey(8)).unwrap();

    r.schliessen();
    r.schliessen();

    assert_eq!(r.verleih().rueckgaben_von(0), 1);
    assert_eq!(r.verleih().rueckgaben_von(1), 1);
    assert!(matches!(
        r.teilnehmer_aktiv(TeilnehmerId(3), StreamKey(9)),
        Err(RouterFehler::Geschlossen)
    ));
    assert_eq!(r.verleih().ausleihen(), 2);
}

#[test]
fn schliessen_waehrend_dispatch_beendet_regulaer() {
    let r = Arc::new(router());
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();

    let (tx, mut quelle) = kanal();
    let r2 = Arc::clone(&r);
    let schleife = thread::spawn(move || r2.starten(&mut quelle));

    r.schliessen();
    // Naechstes Paket trifft auf den geschlossenen Router
    tx.send(paket(7, 1)).unwrap();

    assert!(schleife.join().unwrap().is_ok());
    assert_eq!(r.verleih().rueckgaben_von(0), 1);
}

#[test]
fn hub_ereignisse_und_abmeldung_beim_schliessen() {
    let hub = EreignisHub::neu();
    let r = StreamRouter::mit_quelle(Arc::new(ZaehlVerleih::default()), &hub);

    hub.senden(TeilnehmerEreignis::Verbunden {
        teilnehmer: TeilnehmerId(1),
        stream_key: StreamKey(7),
    });
    hub.senden(TeilnehmerEreignis::Spricht {
        teilnehmer: TeilnehmerId(1),
        stream_key: StreamKey(7),
        spricht: true,
    });
    assert_eq!(r.verleih().ausleihen(), 1);

    r.schliessen();
    assert_eq!(hub.abonnenten_anzahl(), 0);

    // Ereignisse nach dem Schliessen erreichen den Router nicht mehr
    hub.senden(TeilnehmerEreignis::Verbunden {
        teilnehmer: TeilnehmerId(2),
        stream_key: StreamKey(8),
    });
    assert_eq!(r.verleih().ausleihen(), 1);
}

// ---------------------------------------------------------------------------
// Zusammenspiel mit dem echten Pool
// ---------------------------------------------------------------------------

#[test]
fn router_mit_session_pool() {
    let erstellt = Arc::new(AtomicUsize::new(0));
    let zaehler = Arc::clone(&erstellt);
    let pool = Arc::new(
        SessionPool::neu(PoolConfig::neu(2, Duration::from_secs(60)), move || {
            let id = zaehler.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Aufnahme {
                id,
                ..Default::default()
            }))
        })
        .unwrap(),
    );
    pool.fuellen(2).unwrap();

    let r = StreamRouter::neu(Arc::clone(&pool));
    r.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();
    r.teilnehmer_aktiv(TeilnehmerId(2), StreamKey(8)).unwrap();
    assert_eq!(pool.statistik().leerlauf, 0);
    assert_eq!(erstellt.load(Ordering::SeqCst), 2);

    let (tx, mut quelle) = kanal();
    tx.send(paket(7, 1)).unwrap();
    tx.send(paket(8, 1)).unwrap();
    drop(tx);
    r.starten(&mut quelle).unwrap();

    // Beide Sessions wieder im Pool, keine neue erstellt
    assert_eq!(pool.statistik().leerlauf, 2);
    assert_eq!(erstellt.load(Ordering::SeqCst), 2);
}
