//! Persisted catalogues for fast re-open.
//!
//! A sidecar file is
//!
//! ```text
//! [ u32 LE crc32 of body ][ JSON body ]
//! ```
//!
//! The body names the data file, its length and modification time.  A
//! sidecar is only trusted when all of these still match, the sidecar is not
//! older than the data file and the checksum holds; otherwise opening with
//! it yields `None` and callers fall back to a scan.

use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EclError, Result};
use crate::file::Stream;
use crate::fortio::Endian;
use crate::index::{FileIndex, IndexEntry};

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    file_name:     String,
    file_len:      u64,
    file_modified: DateTime<Utc>,
    endian:        Endian,
    entries:       Vec<IndexEntry>,
}

impl Sidecar {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(self)?;
        let mut out = Vec::with_capacity(body.len() + 4);
        out.write_u32::<LittleEndian>(crc32fast::hash(&body))?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// `None` when the checksum fails.
    fn from_bytes(bytes: &[u8]) -> Result<Option<Self>> {
        let mut cursor = Cursor::new(bytes);
        let crc = match cursor.read_u32::<LittleEndian>() {
            Ok(crc) => crc,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let body = &bytes[4..];
        if crc32fast::hash(body) != crc {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(body)?))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

impl FileIndex {
    /// Persist the catalogue next to (or anywhere apart from) its data file.
    pub fn write_sidecar<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let origin = self.origin.as_deref().ok_or_else(|| {
            EclError::Unsupported("only single-file indexes can be persisted".into())
        })?;
        let meta = fs::metadata(origin)?;
        let sidecar = Sidecar {
            file_name:     file_name(origin),
            file_len:      meta.len(),
            file_modified: meta.modified()?.into(),
            endian:        self.endian,
            entries:       self.entries.clone(),
        };
        fs::write(path.as_ref(), sidecar.to_bytes()?)?;
        debug!(path = %path.as_ref().display(), entries = self.entries.len(), "wrote index sidecar");
        Ok(())
    }

    /// Rebuild a lazy index for `stream` from a sidecar without scanning.
    /// Returns `None` when the sidecar is missing, stale or corrupt.
    pub fn open_with_sidecar<P: AsRef<Path>>(stream: &Stream, path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let sidecar = match Sidecar::from_bytes(&bytes) {
            Ok(Some(s)) => s,
            Ok(None) | Err(EclError::Json(_)) => {
                warn!(path = %path.display(), "index sidecar is corrupt; ignoring it");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let data = fs::metadata(stream.path())?;
        let data_modified: DateTime<Utc> = data.modified()?.into();
        let sidecar_modified: DateTime<Utc> = fs::metadata(path)?.modified()?.into();
        let reason = if sidecar.file_name != file_name(stream.path()) {
            Some("file name differs")
        } else if sidecar.file_len != data.len() {
            Some("file length differs")
        } else if sidecar.file_modified != data_modified || sidecar_modified < data_modified {
            Some("data file is newer")
        } else if sidecar.endian != stream.endian() {
            Some("byte order differs")
        } else if !contiguous(&sidecar.entries, data.len()) {
            Some("entries are inconsistent")
        } else {
            None
        };
        if let Some(reason) = reason {
            warn!(path = %path.display(), reason, "index sidecar is stale; ignoring it");
            return Ok(None);
        }

        let mut index = Self::empty(stream.endian(), true, Some(stream.path().to_owned()), stream.downgrade());
        for entry in sidecar.entries {
            index.push(entry, Default::default());
        }
        debug!(path = %path.display(), entries = index.len(), "opened index from sidecar");
        Ok(Some(index))
    }
}

/// Entries must tile the file from offset 0 to its end, in order.
fn contiguous(entries: &[IndexEntry], file_len: u64) -> bool {
    let mut next = 0;
    for (p, e) in entries.iter().enumerate() {
        if e.position != p || e.segment != 0 || e.offset != next {
            return false;
        }
        next = e.end_offset();
    }
    next == file_len
}
