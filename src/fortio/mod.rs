//! Length-framed record I/O, the single physical primitive of the format.
//!
//! Every record on disk is laid out as
//!
//! ```text
//! [ i32 marker = N ][ N payload bytes ][ i32 marker = N ]
//! ```
//!
//! The byte order of the markers (and of every numeric element above this
//! layer) is fixed per stream when it is opened; see [`Endian`].  A leading
//! marker that is negative, runs past the end of the stream, or disagrees
//! with its trailing twin is a [`EclError::Format`].

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{EclError, Result};

/// Size of one length marker in bytes.
pub const MARKER_SIZE: u64 = 4;
/// Largest payload a single record can describe.
pub const MAX_RECORD_LEN: usize = i32::MAX as usize;

// ── Endian ────────────────────────────────────────────────────────────────────

/// Byte order of a stream.  Simulator output is big-endian; reading it on a
/// little-endian host is what the format calls an "endian flip".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    Big,
    Little,
}

impl Default for Endian {
    fn default() -> Self { Endian::Big }
}

impl Endian {
    /// `true` selects big-endian, `false` little-endian.
    pub fn from_flip(endian_flip: bool) -> Self {
        if endian_flip { Endian::Big } else { Endian::Little }
    }

    pub fn is_flipped(self) -> bool { self == Endian::Big }

    pub fn read_i32(self, buf: &[u8]) -> i32 {
        match self {
            Endian::Big    => BigEndian::read_i32(buf),
            Endian::Little => LittleEndian::read_i32(buf),
        }
    }

    pub fn write_i32(self, buf: &mut [u8], v: i32) {
        match self {
            Endian::Big    => BigEndian::write_i32(buf, v),
            Endian::Little => LittleEndian::write_i32(buf, v),
        }
    }

    pub fn read_f32(self, buf: &[u8]) -> f32 {
        match self {
            Endian::Big    => BigEndian::read_f32(buf),
            Endian::Little => LittleEndian::read_f32(buf),
        }
    }

    pub fn write_f32(self, buf: &mut [u8], v: f32) {
        match self {
            Endian::Big    => BigEndian::write_f32(buf, v),
            Endian::Little => LittleEndian::write_f32(buf, v),
        }
    }

    pub fn read_f64(self, buf: &[u8]) -> f64 {
        match self {
            Endian::Big    => BigEndian::read_f64(buf),
            Endian::Little => LittleEndian::read_f64(buf),
        }
    }

    pub fn write_f64(self, buf: &mut [u8], v: f64) {
        match self {
            Endian::Big    => BigEndian::write_f64(buf, v),
            Endian::Little => LittleEndian::write_f64(buf, v),
        }
    }

    fn read_marker<R: Read>(self, mut reader: R) -> io::Result<i32> {
        match self {
            Endian::Big    => reader.read_i32::<BigEndian>(),
            Endian::Little => reader.read_i32::<LittleEndian>(),
        }
    }

    fn write_marker<W: Write>(self, mut writer: W, v: i32) -> io::Result<()> {
        match self {
            Endian::Big    => writer.write_i32::<BigEndian>(v),
            Endian::Little => writer.write_i32::<LittleEndian>(v),
        }
    }
}

// ── FortIo ────────────────────────────────────────────────────────────────────

/// A byte stream wrapped with record framing.
#[derive(Debug)]
pub struct FortIo<S> {
    stream: S,
    endian: Endian,
    /// Cached stream length; dropped whenever we write.
    len:    Option<u64>,
}

impl<S> FortIo<S> {
    pub fn new(stream: S, endian: Endian) -> Self {
        Self { stream, endian, len: None }
    }

    pub fn endian(&self) -> Endian { self.endian }

    pub fn get_mut(&mut self) -> &mut S {
        self.len = None;
        &mut self.stream
    }

    pub fn into_inner(self) -> S { self.stream }
}

impl<S: Seek> FortIo<S> {
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.stream.stream_position()?)
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.stream.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn stream_len(&mut self) -> Result<u64> {
        if let Some(len) = self.len {
            return Ok(len);
        }
        let pos = self.stream.stream_position()?;
        let len = self.stream.seek(SeekFrom::End(0))?;
        self.stream.seek(SeekFrom::Start(pos))?;
        self.len = Some(len);
        Ok(len)
    }

    pub fn at_eof(&mut self) -> Result<bool> {
        let pos = self.position()?;
        Ok(pos >= self.stream_len()?)
    }
}

impl<S: Read + Seek> FortIo<S> {
    /// Read the record starting at `offset`.  Returns the payload and the
    /// offset of the next record.
    pub fn read_record(&mut self, offset: u64) -> Result<(Vec<u8>, u64)> {
        self.seek_to(offset)?;
        let mut payload = Vec::new();
        self.read_record_into(&mut payload)?;
        Ok((payload, self.position()?))
    }

    /// Read the record at the current position, appending its payload to
    /// `out`.  Returns the payload length.
    pub fn read_record_into(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let start = self.position()?;
        let len = self.leading_marker(start)?;
        let base = out.len();
        out.resize(base + len, 0);
        self.stream.read_exact(&mut out[base..]).map_err(|e| truncated(e, start))?;
        self.trailing_marker(start, len)?;
        trace!(offset = start, len, "read record");
        Ok(len)
    }

    /// Skip the record at the current position without reading its payload.
    /// Both markers are still validated.
    pub fn skip_record(&mut self) -> Result<usize> {
        let start = self.position()?;
        let len = self.leading_marker(start)?;
        self.stream.seek(SeekFrom::Current(len as i64))?;
        self.trailing_marker(start, len)?;
        Ok(len)
    }

    /// Payload length of the record at the current position; the stream is
    /// left just past the leading marker.
    pub(crate) fn leading_marker(&mut self, start: u64) -> Result<usize> {
        let marker = self.endian.read_marker(&mut self.stream).map_err(|e| truncated(e, start))?;
        if marker < 0 {
            return Err(EclError::format(start, format!("negative record marker {marker}")));
        }
        let len = marker as usize;
        let end = start + 2 * MARKER_SIZE + len as u64;
        if end > self.stream_len()? {
            return Err(EclError::format(start, format!(
                "record of {len} bytes runs past end of stream"
            )));
        }
        Ok(len)
    }

    fn trailing_marker(&mut self, start: u64, len: usize) -> Result<()> {
        let tail = self.endian.read_marker(&mut self.stream).map_err(|e| truncated(e, start))?;
        if tail as i64 != len as i64 {
            return Err(EclError::format(start, format!(
                "record markers disagree: leading {len}, trailing {tail}"
            )));
        }
        Ok(())
    }
}

impl<S: Write + Seek> FortIo<S> {
    /// Write one record at the current position.  Returns bytes written,
    /// markers included.
    pub fn write_record(&mut self, payload: &[u8]) -> Result<u64> {
        if payload.len() > MAX_RECORD_LEN {
            return Err(EclError::InvalidValue(format!(
                "record payload of {} bytes exceeds the {MAX_RECORD_LEN} byte limit",
                payload.len()
            )));
        }
        self.len = None;
        let marker = payload.len() as i32;
        self.endian.write_marker(&mut self.stream, marker)?;
        self.stream.write_all(payload)?;
        self.endian.write_marker(&mut self.stream, marker)?;
        Ok(payload.len() as u64 + 2 * MARKER_SIZE)
    }

    pub fn seek_end(&mut self) -> Result<u64> {
        self.len = None;
        Ok(self.stream.seek(SeekFrom::End(0))?)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }
}

fn truncated(e: io::Error, offset: u64) -> EclError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        EclError::format(offset, "stream truncated mid-record")
    } else {
        EclError::Io(e)
    }
}

// ── Detection ─────────────────────────────────────────────────────────────────

/// Probe the first record of `reader` under both byte orders.
///
/// Returns the byte order under which the first record frames cleanly, or
/// `None` if neither does.  Never fails; the reader is rewound to where it
/// was.  Big-endian wins a tie.
pub fn detect_endian<R: Read + Seek>(reader: &mut R) -> Option<Endian> {
    let origin = reader.stream_position().ok()?;
    let found = probe(reader, origin, Endian::Big)
        .or_else(|| probe(reader, origin, Endian::Little));
    let _ = reader.seek(SeekFrom::Start(origin));
    debug!(?found, "framing probe");
    found
}

/// Whether `reader` looks like a framed keyword stream at all.
pub fn detect_framing<R: Read + Seek>(reader: &mut R) -> bool {
    detect_endian(reader).is_some()
}

fn probe<R: Read + Seek>(reader: &mut R, origin: u64, endian: Endian) -> Option<Endian> {
    reader.seek(SeekFrom::Start(origin)).ok()?;
    let mut fortio = FortIo::new(&mut *reader, endian);
    match fortio.skip_record() {
        Ok(len) if len > 0 => Some(endian),
        _ => None,
    }
}
