//! Router-Zustand – Zuordnung Teilnehmer -> Stream-Key -> Session
//!
//! Wird ausschliesslich unter dem Router-Mutex veraendert. Invariante:
//! ein Teilnehmer steht genau dann in `stream_keys`, wenn sein Stream-Key
//! in `sessions` steht.

use std::collections::HashMap;

use lauscher_core::{PoolFehler, StreamKey, TeilnehmerId};

use crate::error::RouterFehler;

/// Lebenszyklus des Routers
#[derive(Debug, Clone)]
pub(crate) enum RouterStatus {
    /// Registrierungen erlaubt
    Aktiv,
    /// Session-Ausleihe ist fehlgeschlagen; keine neuen Registrierungen
    Fehlerhaft(PoolFehler),
    /// Endgueltig heruntergefahren
    Geschlossen,
}

/// Ergebnis eines Eintragungsversuchs
pub(crate) enum Eintragung<S> {
    Eingetragen,
    /// Teilnehmer war inzwischen schon registriert – Session zurueckgeben
    BereitsRegistriert(S),
    /// Router nicht mehr aktiv – Session zurueckgeben
    Abgelehnt(S),
    /// Stream-Key gehoert einem anderen Teilnehmer – Session zurueckgeben
    KeyBelegt(S, TeilnehmerId),
}

pub(crate) struct RouterZustand<S> {
    stream_keys: HashMap<TeilnehmerId, StreamKey>,
    sessions: HashMap<StreamKey, S>,
    status: RouterStatus,
}

impl<S: Clone> RouterZustand<S> {
    pub(crate) fn neu() -> Self {
        Self {
            stream_keys: HashMap::new(),
            sessions: HashMap::new(),
            status: RouterStatus::Aktiv,
        }
    }

    pub(crate) fn ist_aktiv(&self) -> bool {
        matches!(self.status, RouterStatus::Aktiv)
    }

    pub(crate) fn ist_geschlossen(&self) -> bool {
        matches!(self.status, RouterStatus::Geschlossen)
    }

    pub(crate) fn ist_registriert(&self, teilnehmer: &TeilnehmerId) -> bool {
        self.stream_keys.contains_key(teilnehmer)
    }

    pub(crate) fn stream_key_von(&self, teilnehmer: &TeilnehmerId) -> Option<StreamKey> {
        self.stream_keys.get(teilnehmer).copied()
    }

    pub(crate) fn anzahl(&self) -> usize {
        self.stream_keys.len()
    }

    /// Setzt den Fehlerzustand, sofern der Router noch aktiv ist
    pub(crate) fn fehler_setzen(&mut self, fehler: PoolFehler) {
        if self.ist_aktiv() {
            self.status = RouterStatus::Fehlerhaft(fehler);
        }
    }

    /// Traegt beide Zuordnungen ein, falls der Router noch aktiv ist
    pub(crate) fn eintragen(
        &mut self,
        teilnehmer: TeilnehmerId,
        stream_key: StreamKey,
        session: S,
    ) -> Eintragung<S> {
        if !self.ist_aktiv() {
            return Eintragung::Abgelehnt(session);
        }
        if self.ist_registriert(&teilnehmer) {
            return Eintragung::BereitsRegistriert(session);
        }
        if self.sessions.contains_key(&stream_key) {
            let besitzer = self
                .stream_keys
                .iter()
                .find(|(_, key)| **key == stream_key)
                .map(|(id, _)| *id)
                .unwrap_or(teilnehmer);
            return Eintragung::KeyBelegt(session, besitzer);
        }

        self.stream_keys.insert(teilnehmer, stream_key);
        self.sessions.insert(stream_key, session);
        Eintragung::Eingetragen
    }

    /// Entfernt beide Zuordnungen eines Teilnehmers
    pub(crate) fn austragen(&mut self, teilnehmer: &TeilnehmerId) -> Option<(StreamKey, S)> {
        let stream_key = self.stream_keys.remove(teilnehmer)?;
        self.sessions
            .remove(&stream_key)
            .map(|session| (stream_key, session))
    }

    /// Session fuer ein eingehendes Paket (Klon des Handles)
    pub(crate) fn session(&self, stream_key: StreamKey) -> Result<S, RouterFehler> {
        match &self.status {
            RouterStatus::Aktiv => self
                .sessions
                .get(&stream_key)
                .cloned()
                .ok_or(RouterFehler::UnbekannterStreamKey(stream_key)),
            RouterStatus::Fehlerhaft(e) => Err(RouterFehler::Ausleihe(e.clone())),
            RouterStatus::Geschlossen => Err(RouterFehler::Geschlossen),
        }
    }

    /// Schliesst den Zustand endgueltig und liefert alle ausgeliehenen Sessions
    pub(crate) fn schliessen(&mut self) -> Vec<S> {
        self.status = RouterStatus::Geschlossen;
        self.stream_keys.clear();
        self.sessions.drain().map(|(_, session)| session).collect()
    }
}

/// Momentaufnahme des Routers
#[derive(Debug, Clone, Default)]
pub struct RouterStatistik {
    /// Registrierte Teilnehmer
    pub aktive_teilnehmer: usize,
    /// Erfolgreich zugestellte Pakete
    pub zugestellt: u64,
    /// Verworfene Pakete (unbekannter Stream-Key)
    pub verworfen: u64,
    /// Fehlgeschlagene Session-Schreibvorgaenge
    pub schreibfehler: u64,
    /// Router ist geschlossen
    pub geschlossen: bool,
}

impl RouterStatistik {
    /// Gibt eine lesbare Zusammenfassung zurueck
    pub fn zusammenfassung(&self) -> String {
        format!(
            "Router: teilnehmer={} zugestellt={} verworfen={} schreibfehler={}{}",
            self.aktive_teilnehmer,
            self.zugestellt,
            self.verworfen,
            self.schreibfehler,
            if self.geschlossen { " [geschlossen]" } else { "" },
        )
    }
}
