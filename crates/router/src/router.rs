//! StreamRouter – Registrierung von Teilnehmern und Paket-Zustellung
//!
//! ## Ablauf
//!
//! ```text
//! Ereignis (Spricht/Verbunden) -> teilnehmer_aktiv   -> Verleih::holen (ohne Lock)
//! Ereignis (Getrennt)          -> teilnehmer_inaktiv -> Verleih::zurueckgeben
//! starten(quelle)              -> paket_lesen -> Session::schreiben (ohne Lock)
//!                              -> beim Ende: schliessen()
//! ```
//!
//! Ein einziger Mutex schuetzt beide Zuordnungen und den Status. Sessions
//! werden unter dem Lock nur geklont (Handle) und ausserhalb beschrieben.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use lauscher_core::{
    Abmeldung, EreignisQuelle, Paket, PaketQuelle, PaketQuellenFehler, Session, SessionVerleih,
    StreamKey, TeilnehmerEreignis, TeilnehmerId,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::error::RouterFehler;
use crate::zustand::{Eintragung, RouterStatistik, RouterZustand};

/// Ordnet Teilnehmer ueber ihren Stream-Key einer ausgeliehenen Session zu
pub struct StreamRouter<V>
where
    V: SessionVerleih + 'static,
    V::Session: Clone,
{
    verleih: V,
    zustand: Mutex<RouterZustand<V::Session>>,
    abmeldung: Mutex<Option<Abmeldung>>,
    zugestellt: AtomicU64,
    verworfen: AtomicU64,
    schreibfehler: AtomicU64,
}

impl<V> StreamRouter<V>
where
    V: SessionVerleih + 'static,
    V::Session: Clone,
{
    /// Erstellt einen Router ohne Ereignis-Abonnement
    pub fn neu(verleih: V) -> Self {
        Self {
            verleih,
            zustand: Mutex::new(RouterZustand::neu()),
            abmeldung: Mutex::new(None),
            zugestellt: AtomicU64::new(0),
            verworfen: AtomicU64::new(0),
            schreibfehler: AtomicU64::new(0),
        }
    }

    /// Erstellt einen Router und abonniert die Teilnehmer-Ereignisse der Quelle.
    ///
    /// Der Handler haelt nur eine schwache Referenz; das Abonnement wird in
    /// [`schliessen`](Self::schliessen) geloest.
    pub fn mit_quelle(verleih: V, quelle: &dyn EreignisQuelle) -> Arc<Self> {
        let router = Arc::new(Self::neu(verleih));
        let schwach: Weak<Self> = Arc::downgrade(&router);

        let abmeldung = quelle.abonnieren(Arc::new(move |ereignis: &TeilnehmerEreignis| {
            let Some(router) = schwach.upgrade() else {
                return;
            };
            if let Err(e) = router.ereignis_verarbeiten(ereignis) {
                warn!(
                    teilnehmer = %ereignis.teilnehmer(),
                    fehler = %e,
                    "Teilnehmer-Ereignis konnte nicht verarbeitet werden"
                );
            }
        }));

        let mut slot = router.abmeldung.lock();
        if router.ist_geschlossen() {
            abmeldung.abmelden();
        } else {
            *slot = Some(abmeldung);
        }
        drop(slot);

        router
    }

    // -----------------------------------------------------------------------
    // Registrierung
    // -----------------------------------------------------------------------

    /// Setzt ein Teilnehmer-Ereignis in Registrierung oder Abmeldung um
    pub fn ereignis_verarbeiten(&self, ereignis: &TeilnehmerEreignis) -> Result<(), RouterFehler> {
        match ereignis {
            TeilnehmerEreignis::Spricht {
                teilnehmer,
                stream_key,
                ..
            }
            | TeilnehmerEreignis::Verbunden {
                teilnehmer,
                stream_key,
            } => self.teilnehmer_aktiv(*teilnehmer, *stream_key),
            TeilnehmerEreignis::Getrennt { teilnehmer } => {
                self.teilnehmer_inaktiv(*teilnehmer);
                Ok(())
            }
        }
    }

    /// Registriert einen Teilnehmer mit seinem Stream-Key.
    ///
    /// Idempotent: ein bereits bekannter Teilnehmer loest keine zweite
    /// Ausleihe aus. Die Session wird ohne Router-Lock geholt; schlaegt das
    /// fehl, geht der Router in den Fehlerzustand und die Dispatch-Schleife
    /// endet beim naechsten Paket.
    pub fn teilnehmer_aktiv(
        &self,
        teilnehmer: TeilnehmerId,
        stream_key: StreamKey,
    ) -> Result<(), RouterFehler> {
        {
            let zustand = self.zustand.lock();
            if !zustand.ist_aktiv() {
                return Err(RouterFehler::Geschlossen);
            }
            if zustand.ist_registriert(&teilnehmer) {
                trace!(teilnehmer = %teilnehmer, "Teilnehmer bereits registriert");
                return Ok(());
            }
        }

        let session = match self.verleih.holen() {
            Ok(session) => session,
            Err(e) => {
                error!(
                    teilnehmer = %teilnehmer,
                    stream_key = %stream_key,
                    fehler = %e,
                    "Session-Ausleihe fehlgeschlagen, Router wird gesperrt"
                );
                self.zustand.lock().fehler_setzen(e.clone());
                return Err(RouterFehler::Ausleihe(e));
            }
        };

        let eintragung = self
            .zustand
            .lock()
            .eintragen(teilnehmer, stream_key, session);

        match eintragung {
            Eintragung::Eingetragen => {
                info!(teilnehmer = %teilnehmer, stream_key = %stream_key, "Teilnehmer registriert");
                Ok(())
            }
            Eintragung::BereitsRegistriert(session) => {
                // Paralleles Ereignis war schneller
                self.verleih.zurueckgeben(session);
                Ok(())
            }
            Eintragung::Abgelehnt(session) => {
                self.verleih.zurueckgeben(session);
                Err(RouterFehler::Geschlossen)
            }
            Eintragung::KeyBelegt(session, besitzer) => {
                self.verleih.zurueckgeben(session);
                warn!(
                    teilnehmer = %teilnehmer,
                    stream_key = %stream_key,
                    besitzer = %besitzer,
                    "Stream-Key bereits vergeben"
                );
                Err(RouterFehler::StreamKeyBelegt {
                    stream_key,
                    besitzer,
                })
            }
        }
    }

    /// Meldet einen Teilnehmer ab und gibt seine Session an den Verleih zurueck.
    /// Unbekannte Teilnehmer werden ignoriert.
    pub fn teilnehmer_inaktiv(&self, teilnehmer: TeilnehmerId) {
        let Some((stream_key, session)) = self.zustand.lock().austragen(&teilnehmer) else {
            return;
        };
        self.verleih.zurueckgeben(session);
        info!(teilnehmer = %teilnehmer, stream_key = %stream_key, "Teilnehmer abgemeldet");
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Liest Pakete sequenziell und stellt sie der zustaendigen Session zu.
    ///
    /// Laeuft bis die Quelle einen Fehler meldet, der Router gesperrt oder
    /// geschlossen wird. Danach ist der Router in jedem Fall geschlossen.
    /// Stream-Ende und explizites Schliessen gelten als regulaeres Ende.
    pub fn starten<Q: PaketQuelle + ?Sized>(&self, quelle: &mut Q) -> Result<(), RouterFehler> {
        info!("Dispatch-Schleife gestartet");
        let grund = self.zustellen_bis_ende(quelle);
        self.schliessen();

        match grund {
            RouterFehler::PaketQuelle(PaketQuellenFehler::StreamEnde) => {
                info!("Paketstrom beendet");
                Ok(())
            }
            RouterFehler::Geschlossen => {
                info!("Dispatch-Schleife nach Schliessen beendet");
                Ok(())
            }
            fehler => {
                error!(fehler = %fehler, "Dispatch-Schleife abgebrochen");
                Err(fehler)
            }
        }
    }

    /// Liefert den Fehler, der die Schleife beendet hat
    fn zustellen_bis_ende<Q: PaketQuelle + ?Sized>(&self, quelle: &mut Q) -> RouterFehler {
        loop {
            let paket = match quelle.paket_lesen() {
                Ok(paket) => paket,
                Err(e) => return RouterFehler::PaketQuelle(e),
            };

            match self.paket_zustellen(&paket) {
                Ok(()) => {}
                Err(e) if !e.ist_fatal() => {
                    self.verworfen.fetch_add(1, Ordering::Relaxed);
                    debug!(stream_key = %paket.stream_key, sequenz = paket.sequenz, "Paket verworfen");
                }
                Err(e) => return e,
            }
        }
    }

    /// Stellt ein einzelnes Paket zu. Schreibfehler werden nur protokolliert.
    fn paket_zustellen(&self, paket: &Paket) -> Result<(), RouterFehler> {
        let session = self.zustand.lock().session(paket.stream_key)?;

        match session.schreiben(paket) {
            Ok(()) => {
                self.zugestellt.fetch_add(1, Ordering::Relaxed);
                trace!(stream_key = %paket.stream_key, sequenz = paket.sequenz, "Paket zugestellt");
            }
            Err(e) => {
                self.schreibfehler.fetch_add(1, Ordering::Relaxed);
                warn!(
                    stream_key = %paket.stream_key,
                    sequenz = paket.sequenz,
                    fehler = %e,
                    "Session-Schreibfehler"
                );
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Herunterfahren / Abfragen
    // -----------------------------------------------------------------------

    /// Schliesst den Router endgueltig (idempotent).
    ///
    /// Jede ausgeliehene Session wird genau einmal zurueckgegeben, danach
    /// wird das Ereignis-Abonnement geloest.
    pub fn schliessen(&self) {
        let sessions = {
            let mut zustand = self.zustand.lock();
            if zustand.ist_geschlossen() {
                return;
            }
            zustand.schliessen()
        };

        let anzahl = sessions.len();
        for session in sessions {
            self.verleih.zurueckgeben(session);
        }

        if let Some(abmeldung) = self.abmeldung.lock().take() {
            abmeldung.abmelden();
        }

        info!(zurueckgegeben = anzahl, "Router geschlossen");
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.zustand.lock().ist_geschlossen()
    }

    /// Stream-Key eines registrierten Teilnehmers
    pub fn stream_key_von(&self, teilnehmer: TeilnehmerId) -> Option<StreamKey> {
        self.zustand.lock().stream_key_von(&teilnehmer)
    }

    pub fn statistik(&self) -> RouterStatistik {
        let zustand = self.zustand.lock();
        RouterStatistik {
            aktive_teilnehmer: zustand.anzahl(),
            zugestellt: self.zugestellt.load(Ordering::Relaxed),
            verworfen: self.verworfen.load(Ordering::Relaxed),
            schreibfehler: self.schreibfehler.load(Ordering::Relaxed),
            geschlossen: zustand.ist_geschlossen(),
        }
    }

    pub fn verleih(&self) -> &V {
        &self.verleih
    }
}

impl<V> Drop for StreamRouter<V>
where
    V: SessionVerleih + 'static,
    V::Session: Clone,
{
    fn drop(&mut self) {
        self.schliessen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lauscher_core::{EreignisHub, PoolFehler, SessionFehler};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Notiz {
        geschrieben: Mutex<Vec<u16>>,
    }

    impl Session for Notiz {
        fn schreiben(&self, paket: &Paket) -> Result<(), SessionFehler> {
            self.geschrieben.lock().push(paket.sequenz);
            Ok(())
        }

        fn schliessen(&self) -> Result<(), SessionFehler> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Verleih {
        geholt: AtomicUsize,
        zurueck: AtomicUsize,
        kaputt: std::sync::atomic::AtomicBool,
    }

    impl SessionVerleih for Verleih {
        type Session = Arc<Notiz>;

        fn holen(&self) -> Result<Arc<Notiz>, PoolFehler> {
            if self.kaputt.load(Ordering::SeqCst) {
                return Err(PoolFehler::from(SessionFehler::Erstellung("kaputt".into())));
            }
            self.geholt.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Notiz::default()))
        }

        fn versuchen_holen(&self) -> Result<Arc<Notiz>, PoolFehler> {
            Err(PoolFehler::KeineSessionsVerfuegbar)
        }

        fn zurueckgeben(&self, _session: Arc<Notiz>) {
            self.zurueck.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Liste(std::vec::IntoIter<Paket>);

    impl PaketQuelle for Liste {
        fn paket_lesen(&mut self) -> Result<Paket, PaketQuellenFehler> {
            self.0.next().ok_or(PaketQuellenFehler::StreamEnde)
        }
    }

    fn paket(key: u32, seq: u16) -> Paket {
        Paket::neu(StreamKey(key), seq, 0, vec![0u8; 4])
    }

    #[test]
    fn registrierung_ist_idempotent() {
        let router = StreamRouter::neu(Verleih::default());
        router.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();
        router.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();

        assert_eq!(router.verleih().geholt.load(Ordering::SeqCst), 1);
        assert_eq!(router.stream_key_von(TeilnehmerId(1)), Some(StreamKey(7)));
    }

    #[test]
    fn abmeldung_gibt_session_zurueck() {
        let router = StreamRouter::neu(Verleih::default());
        router.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();
        router.teilnehmer_inaktiv(TeilnehmerId(1));
        router.teilnehmer_inaktiv(TeilnehmerId(1));

        assert_eq!(router.verleih().zurueck.load(Ordering::SeqCst), 1);
        assert_eq!(router.statistik().aktive_teilnehmer, 0);
    }

    #[test]
    fn stream_ende_ist_regulaer_und_schliesst() {
        let router = StreamRouter::neu(Verleih::default());
        router.teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7)).unwrap();

        let mut quelle = Liste(vec![paket(7, 1), paket(9, 2), paket(7, 3)].into_iter());
        router.starten(&mut quelle).unwrap();

        let statistik = router.statistik();
        assert_eq!(statistik.zugestellt, 2);
        assert_eq!(statistik.verworfen, 1);
        assert!(statistik.geschlossen);
        assert_eq!(router.verleih().zurueck.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ausleihfehler_sperrt_router() {
        let router = StreamRouter::neu(Verleih::default());
        router.verleih().kaputt.store(true, Ordering::SeqCst);

        let fehler = router
            .teilnehmer_aktiv(TeilnehmerId(1), StreamKey(7))
            .unwrap_err();
        assert!(matches!(fehler, RouterFehler::Ausleihe(_)));

        router.verleih().kaputt.store(false, Ordering::SeqCst);
        assert!(matches!(
            router.teilnehmer_aktiv(TeilnehmerId(2), StreamKey(8)),
            Err(RouterFehler::Geschlossen)
        ));

        let mut quelle = Liste(vec![paket(8, 1)].into_iter());
        assert!(matches!(
            router.starten(&mut quelle),
            Err(RouterFehler::Ausleihe(_))
        ));
        assert!(router.ist_geschlossen());
    }

    #[test]
    fn ereignisse_steuern_registrierung() {
        let hub = EreignisHub::neu();
        let router = StreamRouter::mit_quelle(Verleih::default(), &hub);
        assert_eq!(hub.abonnenten_anzahl(), 1);

        hub.senden(TeilnehmerEreignis::Spricht {
            teilnehmer: TeilnehmerId(4),
            stream_key: StreamKey(40),
            spricht: true,
        });
        assert_eq!(router.stream_key_von(TeilnehmerId(4)), Some(StreamKey(40)));

        hub.senden(TeilnehmerEreignis::Getrennt {
            teilnehmer: TeilnehmerId(4),
        });
        assert_eq!(router.stream_key_von(TeilnehmerId(4)), None);

        router.schliessen();
        assert_eq!(hub.abonnenten_anzahl(), 0);
    }

    #[test]
    fn drop_loest_abonnement() {
        let hub = EreignisHub::neu();
        let router = StreamRouter::mit_quelle(Verleih::default(), &hub);
        drop(router);
        assert_eq!(hub.abonnenten_anzahl(), 0);
    }
}
