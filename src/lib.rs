pub mod error;
pub mod fortio;
pub mod kw;
pub mod file;
pub mod index;
pub mod view;
pub mod restart;
pub mod grid;
pub mod kind;

pub use error::{EclError, Result};
pub use fortio::{detect_endian, detect_framing, Endian, FortIo};
pub use kw::{EclType, Element, Keyword, KeywordData, KeywordHeader, Numeric};
pub use file::{Mode, OpenOptions, Stream};
pub use index::{FileIndex, IndexEntry, KeywordRef};
pub use view::FileView;
pub use restart::{resolve, scan_restart_points, RestartPoint, RestartQuery, RestartResolver};
pub use grid::{ActiveMap, GridDims, GridOverlay};
pub use kind::{FileInfo, FileKind};

use std::path::Path;

/// Open `path` in `mode`; `endian_flip` selects big-endian.
pub fn open<P: AsRef<Path>>(path: P, mode: Mode, endian_flip: bool) -> Result<Stream> {
    Stream::open(path, &OpenOptions::new().mode(mode).endian_flip(endian_flip))
}

/// Catalogue every keyword of `stream`.
pub fn build_index(stream: &Stream, lazy: bool) -> Result<FileIndex> {
    FileIndex::build(stream, lazy)
}
