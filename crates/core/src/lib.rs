//! lauscher-core – Gemeinsame Typen, Traits und Fehlertypen
//!
//! Dieses Crate stellt die Schnittstellen bereit, ueber die Pool, Router und
//! die externen Kollaborateure (Gateway, Ausgabe, Paketquelle) miteinander
//! sprechen.

pub mod error;
pub mod event;
pub mod packet;
pub mod session;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{PaketQuellenFehler, PoolFehler, SessionFehler};
pub use event::{Abmeldung, EreignisHandler, EreignisHub, EreignisQuelle, TeilnehmerEreignis};
pub use packet::{Paket, STANDARD_FRAME_TICKS};
pub use session::{PaketQuelle, Session, SessionVerleih};
pub use types::{StreamKey, TeilnehmerId};
