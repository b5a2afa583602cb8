//! lauscher-router – Stream-Router
//!
//! Ordnet externe Teilnehmer einem Stream-Key und einer ausgeliehenen
//! Session zu und stellt jedes eingehende Paket der richtigen Session zu.
//!
//! ## Module
//! - [`router`] – [`StreamRouter`] mit Registrierung und Dispatch-Schleife
//! - [`zustand`] – Gelockter Zuordnungs-Zustand und Statistik
//! - [`error`] – [`RouterFehler`]

pub mod error;
pub mod router;
pub mod zustand;

pub use error::RouterFehler;
pub use router::StreamRouter;
pub use zustand::RouterStatistik;
