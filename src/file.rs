//! Open streams, the only owners of an OS file handle.
//!
//! ```no_run
//! use eclbin::{Keyword, Mode, OpenOptions, Stream};
//!
//! // Write
//! let mut out = Stream::open("CASE.INIT", &OpenOptions::new().mode(Mode::Write))?;
//! out.write_keyword(&Keyword::new_float("PORO", vec![0.2, 0.25, 0.3])?)?;
//! out.close()?;
//!
//! // Read
//! let input = Stream::open("CASE.INIT", &OpenOptions::default())?;
//! let index = input.build_index()?;
//! let poro = index.named("PORO", 0)?.load()?;
//! assert_eq!(poro.len(), 3);
//! # Ok::<(), eclbin::EclError>(())
//! ```
//!
//! Indexes built from a stream keep only a weak handle to it.  Closing or
//! dropping the stream releases the file; a lazy index then reports
//! [`EclError::StreamClosed`] for payloads it has not cached yet.

use std::fs::{File, OpenOptions as FsOpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

use crate::error::{EclError, Result};
use crate::fortio::{detect_endian, Endian, FortIo};
use crate::index::FileIndex;
use crate::kw::{codec, Keyword};

pub(crate) type SharedIo = Mutex<Option<FortIo<File>>>;

// ── OpenOptions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    /// Create or truncate, then write.
    Write,
    /// Open or create; writes always land at the end.
    Append,
}

/// Configuration for [`Stream::open`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub mode:        Mode,
    /// `true` for big-endian files (the simulator's native output).
    pub endian_flip: bool,
    /// Defer payload decoding until first access.
    pub lazy:        bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            mode:        Mode::Read,
            endian_flip: true,
            lazy:        true,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self { Self::default() }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn endian_flip(mut self, endian_flip: bool) -> Self {
        self.endian_flip = endian_flip;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }
}

// ── Stream ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Stream {
    path:   PathBuf,
    mode:   Mode,
    endian: Endian,
    lazy:   bool,
    io:     Arc<SharedIo>,
}

impl Stream {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P, opts: &OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let endian = Endian::from_flip(opts.endian_flip);
        let file = match opts.mode {
            Mode::Read   => File::open(&path)?,
            Mode::Write  => FsOpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path)?,
            Mode::Append => FsOpenOptions::new().read(true).write(true).create(true).open(&path)?,
        };
        let mut fortio = FortIo::new(file, endian);

        if opts.mode == Mode::Append && fortio.stream_len()? > 0 {
            let found = detect_endian(fortio.get_mut());
            if found != Some(endian) {
                return Err(EclError::format(0, format!(
                    "cannot append {endian:?} records to {} (detected {found:?})",
                    path.display()
                )));
            }
        }

        debug!(path = %path.display(), mode = ?opts.mode, ?endian, "opened stream");
        Ok(Self {
            path,
            mode: opts.mode,
            endian,
            lazy: opts.lazy,
            io: Arc::new(Mutex::new(Some(fortio))),
        })
    }

    /// Shorthand for a fresh big- or little-endian file in write mode.
    pub fn create<P: AsRef<Path>>(path: P, endian_flip: bool) -> Result<Self> {
        Self::open(path, &OpenOptions::new().mode(Mode::Write).endian_flip(endian_flip))
    }

    /// Probe a file's byte order without committing to a parse.
    pub fn probe<P: AsRef<Path>>(path: P) -> Option<Endian> {
        let mut file = File::open(path).ok()?;
        detect_endian(&mut file)
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }
    pub fn mode(&self) -> Mode { self.mode }
    pub fn endian(&self) -> Endian { self.endian }
    pub fn is_lazy(&self) -> bool { self.lazy }

    pub fn is_open(&self) -> bool { lock(&self.io).is_some() }

    // ── Indexing ─────────────────────────────────────────────────────────────

    /// Index the stream using the laziness it was opened with.
    pub fn build_index(&self) -> Result<FileIndex> {
        FileIndex::build(self, self.lazy)
    }

    // ── Write ────────────────────────────────────────────────────────────────

    /// Append one keyword.  Returns bytes written.
    pub fn write_keyword(&mut self, kw: &Keyword) -> Result<u64> {
        if self.mode == Mode::Read {
            return Err(EclError::ReadOnly);
        }
        self.with_io(|fortio| {
            fortio.seek_end()?;
            codec::write_keyword(fortio, kw)
        })
    }

    pub fn write_all<'k, I>(&mut self, keywords: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'k Keyword>,
    {
        keywords.into_iter().try_fold(0, |acc, kw| Ok(acc + self.write_keyword(kw)?))
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Release the file handle.  Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let taken = lock(&self.io).take();
        if let Some(mut fortio) = taken {
            if self.mode != Mode::Read {
                fortio.flush()?;
            }
            debug!(path = %self.path.display(), "closed stream");
        }
        Ok(())
    }

    // ── Crate internals ──────────────────────────────────────────────────────

    pub(crate) fn with_io<T>(&self, f: impl FnOnce(&mut FortIo<File>) -> Result<T>) -> Result<T> {
        let mut guard = lock(&self.io);
        let fortio = guard.as_mut().ok_or(EclError::StreamClosed)?;
        f(fortio)
    }

    pub(crate) fn downgrade(&self) -> Weak<SharedIo> {
        Arc::downgrade(&self.io)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

pub(crate) fn lock(io: &SharedIo) -> MutexGuard<'_, Option<FortIo<File>>> {
    io.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
