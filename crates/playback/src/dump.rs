//! Dump-Aufnahme und -Wiedergabe
//!
//! Format einer `.dump`-Datei: Folge von Datensaetzen
//!
//! ```text
//! +----------------------+------------------+
//! | Laenge (u32, LE)     | Nutzdaten        |
//! +----------------------+------------------+
//! ```
//!
//! [`DumpSenke`] schreibt pro Session eine Datei `<verzeichnis>/<unix-nanos>.dump`,
//! [`DumpQuelle`] liest eine solche Datei als Paketstrom wieder ein.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use lauscher_core::{Paket, PaketQuelle, PaketQuellenFehler, SessionFehler, StreamKey};
use tracing::{debug, info};

use crate::ausgabe::{Frame, FrameSenke};

/// Obergrenze fuer einen einzelnen Datensatz
pub const MAX_DATENSATZ: usize = 1024 * 1024;

const PRAEFIX: usize = 4;

// ---------------------------------------------------------------------------
// DumpSenke
// ---------------------------------------------------------------------------

/// Schreibt die Nutzdaten jedes Frames mit Laengenpraefix in eine Datei
pub struct DumpSenke {
    schreiber: BufWriter<File>,
    pfad: PathBuf,
    puffer: BytesMut,
    datensaetze: u64,
}

impl DumpSenke {
    /// Legt eine neue Datei im Verzeichnis an (Name: aktuelle Unix-Nanosekunden)
    pub fn erstellen(verzeichnis: impl AsRef<Path>) -> Result<Self, SessionFehler> {
        let verzeichnis = verzeichnis.as_ref();
        let mut nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

        // Gleichzeitig erstellte Sessions duerfen sich nicht ueberschreiben
        let (datei, pfad) = loop {
            let pfad = verzeichnis.join(format!("{nanos}.dump"));
            match OpenOptions::new().write(true).create_new(true).open(&pfad) {
                Ok(datei) => break (datei, pfad),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => nanos += 1,
                Err(e) => return Err(SessionFehler::Io(e)),
            }
        };

        debug!(pfad = %pfad.display(), "Dump-Datei angelegt");
        Ok(Self {
            schreiber: BufWriter::new(datei),
            pfad,
            puffer: BytesMut::with_capacity(PRAEFIX + 512),
            datensaetze: 0,
        })
    }

    pub fn pfad(&self) -> &Path {
        &self.pfad
    }
}

impl FrameSenke for DumpSenke {
    fn frame_schreiben(&mut self, frame: &Frame) -> Result<(), SessionFehler> {
        let laenge = u32::try_from(frame.nutzdaten.len())
            .map_err(|_| SessionFehler::Schreiben("Frame zu gross fuer Dump".into()))?;

        self.puffer.clear();
        self.puffer.put_u32_le(laenge);
        self.puffer.put_slice(&frame.nutzdaten);
        self.schreiber.write_all(&self.puffer)?;
        self.datensaetze += 1;
        Ok(())
    }

    fn abschliessen(&mut self) -> Result<(), SessionFehler> {
        self.schreiber.flush()?;
        debug!(
            pfad = %self.pfad.display(),
            datensaetze = self.datensaetze,
            "Dump-Datei abgeschlossen"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DumpQuelle
// ---------------------------------------------------------------------------

/// Liest eine Dump-Datei als Paketstrom eines einzelnen Stream-Keys.
///
/// Sequenznummern zaehlen ab 0 hoch, Zeitstempel steigen um `frame_ticks`.
pub struct DumpQuelle<R = BufReader<File>> {
    leser: R,
    stream_key: StreamKey,
    sequenz: u16,
    zeitstempel: u32,
    frame_ticks: u32,
    gelesen: u64,
}

impl DumpQuelle {
    pub fn oeffnen(
        pfad: impl AsRef<Path>,
        stream_key: StreamKey,
        frame_ticks: u32,
    ) -> Result<Self, PaketQuellenFehler> {
        let pfad = pfad.as_ref();
        let datei = File::open(pfad)?;
        info!(pfad = %pfad.display(), stream_key = %stream_key, "Dump-Datei geoeffnet");
        Ok(Self::aus_leser(BufReader::new(datei), stream_key, frame_ticks))
    }
}

impl<R: Read> DumpQuelle<R> {
    pub fn aus_leser(leser: R, stream_key: StreamKey, frame_ticks: u32) -> Self {
        Self {
            leser,
            stream_key,
            sequenz: 0,
            zeitstempel: 0,
            frame_ticks,
            gelesen: 0,
        }
    }

    /// Anzahl bisher gelieferter Pakete
    pub fn gelesen(&self) -> u64 {
        self.gelesen
    }

    /// Liest das Laengenpraefix. `None` bei sauberem Dateiende.
    fn praefix_lesen(&mut self) -> Result<Option<usize>, PaketQuellenFehler> {
        let mut praefix = [0u8; PRAEFIX];
        let mut gefuellt = 0;
        while gefuellt < PRAEFIX {
            match self.leser.read(&mut praefix[gefuellt..]) {
                Ok(0) if gefuellt == 0 => return Ok(None),
                Ok(0) => {
                    return Err(PaketQuellenFehler::UngueltigesPaket(
                        "Laengenpraefix abgeschnitten".into(),
                    ))
                }
                Ok(n) => gefuellt += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(u32::from_le_bytes(praefix) as usize))
    }
}

impl<R: Read> PaketQuelle for DumpQuelle<R> {
    fn paket_lesen(&mut self) -> Result<Paket, PaketQuellenFehler> {
        let Some(laenge) = self.praefix_lesen()? else {
            debug!(pakete = self.gelesen, "Dump-Datei vollstaendig gelesen");
            return Err(PaketQuellenFehler::StreamEnde);
        };
        if laenge > MAX_DATENSATZ {
            return Err(PaketQuellenFehler::UngueltigesPaket(format!(
                "Datensatz zu gross: {laenge} Bytes"
            )));
        }

        let mut nutzdaten = vec![0u8; laenge];
        self.leser.read_exact(&mut nutzdaten).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                PaketQuellenFehler::UngueltigesPaket("Datensatz abgeschnitten".into())
            } else {
                PaketQuellenFehler::Io(e)
            }
        })?;

        let paket = Paket::neu(
            self.stream_key,
            self.sequenz,
            self.zeitstempel,
            Bytes::from(nutzdaten),
        );
        self.sequenz = self.sequenz.wrapping_add(1);
        self.zeitstempel = self.zeitstempel.wrapping_add(self.frame_ticks);
        self.gelesen += 1;
        Ok(paket)
    }
}
