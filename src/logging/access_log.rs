//! # Access Log
//! src/logging/access_log.rs
//!
//! Una línea por intercambio completado:
//!
//! ```text
//! 127.0.0.1 - - [18/Oct/2026:10:00:00 +0000] "GET /index.html HTTP/1.1" 200 512
//! ```
//!
//! Cada proceso tiene su propio descriptor; la escritura y la rotación se hacen
//! con el mutex de log entre procesos tomado. Cuando el archivo supera
//! `max_bytes` se renombra a `<archivo>.1` y los demás procesos notan el
//! cambio de inode y reabren.

use crate::http::StatusCode;
use crate::ipc::SyncSet;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::net::IpAddr;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Datos de una línea del log
#[derive(Debug, Clone)]
pub struct AccessRecord<'a> {
    pub client: Option<IpAddr>,
    pub time: DateTime<Utc>,
    /// `-` cuando el request no pudo parsearse
    pub method: &'a str,
    pub path: &'a str,
    pub version: &'a str,
    pub status: StatusCode,
    pub bytes: u64,
}

impl AccessRecord<'_> {
    pub fn format_line(&self) -> String {
        let client = self
            .client
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} - - [{}] \"{} {} {}\" {} {}\n",
            client,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.path,
            self.version,
            self.status.as_u16(),
            self.bytes,
        )
    }
}

pub struct AccessLog {
    path: PathBuf,
    rotated: PathBuf,
    max_bytes: u64,
    sync: Arc<SyncSet>,
    file: Mutex<Option<File>>,
}

impl AccessLog {
    /// Crea el directorio si hace falta y abre el archivo en modo append
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, sync: Arc<SyncSet>) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = open_append(&path)?;

        let mut rotated = path.clone().into_os_string();
        rotated.push(".1");

        Ok(Self {
            path,
            rotated: PathBuf::from(rotated),
            max_bytes,
            sync,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rotated_path(&self) -> &Path {
        &self.rotated
    }

    /// Agrega una línea bajo el mutex de log
    pub fn append(&self, record: &AccessRecord<'_>) -> io::Result<()> {
        let line = record.format_line();

        let _guard = self.sync.log.lock()?;
        let mut slot = self.file.lock();

        // Otro proceso pudo haber rotado el archivo
        let current = match fs::metadata(&self.path) {
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };
        let stale = match (slot.as_ref(), current.as_ref()) {
            (Some(file), Some(meta)) => file.metadata()?.ino() != meta.ino(),
            _ => true,
        };
        if stale {
            *slot = Some(open_append(&self.path)?);
        }

        let file = slot
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "access log not open"))?;
        file.write_all(line.as_bytes())?;

        if file.metadata()?.len() > self.max_bytes {
            fs::rename(&self.path, &self.rotated)?;
            *slot = None;
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
