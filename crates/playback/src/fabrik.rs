//! Session-Fabrik fuer den Pool

use std::path::PathBuf;
use std::sync::Arc;

use lauscher_core::SessionFehler;

use crate::ausgabe::{AusgabeKontext, NullSenke};
use crate::dump::DumpSenke;
use crate::session::WiedergabeSession;

/// Wohin die Frames einer Session gehen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AusgabeModus {
    /// Eine Dump-Datei pro Session im Verzeichnis
    Dump(PathBuf),
    Verwerfen,
}

/// Erzeugt die Fabrik-Closure, die der Session-Pool aufruft
pub fn wiedergabe_fabrik(
    kontext: Arc<AusgabeKontext>,
    modus: AusgabeModus,
) -> impl Fn() -> Result<Arc<WiedergabeSession>, SessionFehler> + Send + Sync + 'static {
    move || {
        let session = match &modus {
            AusgabeModus::Dump(verzeichnis) => {
                let senke = DumpSenke::erstellen(verzeichnis)?;
                WiedergabeSession::neu(Arc::clone(&kontext), senke)?
            }
            AusgabeModus::Verwerfen => {
                WiedergabeSession::neu(Arc::clone(&kontext), NullSenke::default())?
            }
        };
        Ok(Arc::new(session))
    }
}
