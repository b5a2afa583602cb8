//! Faehigkeiten, die der Kern konsumiert
//!
//! - [`Session`] – teure, wiederverwendbare Ressource, die Pakete annimmt
//! - [`SessionVerleih`] – Ausleihe/Rueckgabe von Sessions (vom Pool implementiert)
//! - [`PaketQuelle`] – blockierende Quelle des eingehenden Paketstroms
//!
//! Sessions werden ueber `&self` angesprochen: der Router schreibt ausserhalb
//! seines Locks, waehrend Notification-Handler parallel laufen koennen.

use std::sync::Arc;

use crate::error::{PaketQuellenFehler, PoolFehler, SessionFehler};
use crate::packet::Paket;

/// Opake Dekodier-/Wiedergabe-Session
pub trait Session: Send + Sync {
    /// Uebergibt ein Paket an die Session
    fn schreiben(&self, paket: &Paket) -> Result<(), SessionFehler>;

    /// Schliesst die Session. Mehrfacher Aufruf sollte harmlos sein.
    fn schliessen(&self) -> Result<(), SessionFehler>;
}

impl<T: Session + ?Sized> Session for Arc<T> {
    fn schreiben(&self, paket: &Paket) -> Result<(), SessionFehler> {
        (**self).schreiben(paket)
    }

    fn schliessen(&self) -> Result<(), SessionFehler> {
        (**self).schliessen()
    }
}

impl<T: Session + ?Sized> Session for Box<T> {
    fn schreiben(&self, paket: &Paket) -> Result<(), SessionFehler> {
        (**self).schreiben(paket)
    }

    fn schliessen(&self) -> Result<(), SessionFehler> {
        (**self).schliessen()
    }
}

/// Ausleihe von Sessions – der Router kennt den Pool nur ueber diesen Trait
pub trait SessionVerleih: Send + Sync {
    type Session: Session;

    /// Leerlauf-Session oder synchron neu erstellte Session
    fn holen(&self) -> Result<Self::Session, PoolFehler>;

    /// Leerlauf-Session, ohne synchron zu erstellen
    fn versuchen_holen(&self) -> Result<Self::Session, PoolFehler>;

    /// Gibt eine ausgeliehene Session zurueck (schliesst sie ggf. selbst)
    fn zurueckgeben(&self, session: Self::Session);
}

impl<V: SessionVerleih + ?Sized> SessionVerleih for Arc<V> {
    type Session = V::Session;

    fn holen(&self) -> Result<Self::Session, PoolFehler> {
        (**self).holen()
    }

    fn versuchen_holen(&self) -> Result<Self::Session, PoolFehler> {
        (**self).versuchen_holen()
    }

    fn zurueckgeben(&self, session: Self::Session) {
        (**self).zurueckgeben(session)
    }
}

/// Blockierende Paketquelle (z.B. UDP-Verbindung des Gateways)
pub trait PaketQuelle {
    /// Liest das naechste Paket. Ein Fehler signalisiert Stream-Ende oder Transportfehler.
    fn paket_lesen(&mut self) -> Result<Paket, PaketQuellenFehler>;
}

impl<Q: PaketQuelle + ?Sized> PaketQuelle for Box<Q> {
    fn paket_lesen(&mut self) -> Result<Paket, PaketQuellenFehler> {
        (**self).paket_lesen()
    }
}
