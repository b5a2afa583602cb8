//! lauscher-pool – Begrenzter Session-Pool
//!
//! Haelt eine begrenzte Menge teurer Sessions im Leerlauf vor, erstellt bei
//! Bedarf neue ueber eine injizierte Fabrik und verdraengt Sessions, die
//! laenger als `max_alter` ungenutzt waren.
//!
//! ## Module
//! - [`config`] – Groesse, Alter und Verdraengungs-Verhalten
//! - [`pool`] – Der eigentliche [`SessionPool`]
//! - [`zustand`] – Erstellungs-Zustand und Statistik-Snapshot

pub mod config;
pub mod pool;
pub mod zustand;

pub use config::PoolConfig;
pub use pool::{SessionFabrik, SessionPool};
pub use zustand::{ErstellZustand, PoolStatistik};
