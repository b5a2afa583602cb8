//! lauscher-playback – Wiedergabe-Sessions
//!
//! Konkrete [`Session`](lauscher_core::Session)-Implementierung fuer den Pool:
//! jede Session filtert veraltete Pakete, reicht Frames ueber eine begrenzte
//! Warteschlange an einen eigenen Worker-Thread weiter und schreibt sie dort
//! in eine [`FrameSenke`].
//!
//! ## Module
//! - [`sequenz`] – Wrap-Around-sicherer Sequenzfilter
//! - [`ausgabe`] – Frames, Senken, geteilter [`AusgabeKontext`]
//! - [`session`] – [`WiedergabeSession`]
//! - [`dump`] – Dump-Aufnahme ([`DumpSenke`]) und -Wiedergabe ([`DumpQuelle`])
//! - [`fabrik`] – Fabrik-Closure fuer den Session-Pool

pub mod ausgabe;
pub mod dump;
pub mod fabrik;
pub mod sequenz;
pub mod session;

pub use ausgabe::{AusgabeConfig, AusgabeKontext, Frame, FrameSenke, NullSenke};
pub use dump::{DumpQuelle, DumpSenke};
pub use fabrik::{wiedergabe_fabrik, AusgabeModus};
pub use sequenz::SequenzFilter;
pub use session::WiedergabeSession;
