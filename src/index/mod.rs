//! The keyword catalogue of one stream (or one segmented file set).
//!
//! Building an index is a single forward pass over header records.  Payloads
//! are either decoded during the pass (eager) or skipped over by their
//! declared size and decoded on first access (lazy).  Either way each payload
//! is decoded at most once and cached for the lifetime of the index.
//!
//! Entries are immutable once built.  [`FileIndex::refresh`] can pick up
//! keywords appended to the stream afterwards; it only ever adds entries.

mod segments;
mod sidecar;

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{EclError, Result};
use crate::file::{lock, SharedIo, Stream};
use crate::fortio::{Endian, FortIo, MARKER_SIZE};
use crate::kw::{codec, Keyword, KeywordHeader, HEADER_LEN};
use crate::view::FileView;

// ── IndexEntry ────────────────────────────────────────────────────────────────

/// Where one keyword lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Sequence position within the index.
    pub position: usize,
    pub header:   KeywordHeader,
    /// Byte offset of the header record.
    pub offset:   u64,
    /// On-disk size of the data records, markers included.
    pub data_len: u64,
    /// Segment number for multi-segment indexes, 0 otherwise.
    #[serde(default)]
    pub segment:  usize,
}

impl IndexEntry {
    pub fn name(&self) -> &str { self.header.name() }

    /// Offset of the first data record.
    pub fn data_offset(&self) -> u64 {
        self.offset + HEADER_LEN as u64 + 2 * MARKER_SIZE
    }

    /// Offset just past the keyword's last record.
    pub fn end_offset(&self) -> u64 {
        self.data_offset() + self.data_len
    }
}

// ── FileIndex ─────────────────────────────────────────────────────────────────

pub struct FileIndex {
    entries: Vec<IndexEntry>,
    /// Name → ascending positions.
    names:   HashMap<String, Vec<usize>>,
    /// Distinct names in first-seen order.
    order:   Vec<String>,
    cache:   Vec<OnceLock<Keyword>>,
    endian:  Endian,
    lazy:    bool,
    /// Source file of a single-stream index.
    origin:  Option<PathBuf>,
    /// Non-owning handle used for lazy loads.  Dangling for eager indexes.
    io:      Weak<SharedIo>,
}

impl FileIndex {
    // ── Construction ─────────────────────────────────────────────────────────

    /// Scan `stream` from the start and catalogue every keyword.
    ///
    /// Any framing or type-tag error aborts the build; a partial index is
    /// never returned.
    pub fn build(stream: &Stream, lazy: bool) -> Result<Self> {
        let io = if lazy { stream.downgrade() } else { Weak::new() };
        let mut index = Self::empty(stream.endian(), lazy, Some(stream.path().to_owned()), io);
        let added = stream.with_io(|fortio| {
            fortio.seek_to(0)?;
            index.scan(fortio, 0)
        })?;
        debug!(path = %stream.path().display(), entries = added, lazy, "built index");
        Ok(index)
    }

    /// Eagerly index an in-memory or otherwise unowned reader.  The result
    /// never touches `reader` again.
    pub fn from_reader<R: Read + Seek>(reader: R, endian: Endian) -> Result<Self> {
        let mut fortio = FortIo::new(reader, endian);
        let mut index = Self::empty(endian, false, None, Weak::new());
        fortio.seek_to(0)?;
        let added = index.scan(&mut fortio, 0)?;
        debug!(entries = added, "built index from reader");
        Ok(index)
    }

    /// Catalogue keywords appended to `stream` since this index was built.
    /// Returns the number of new entries.
    pub fn refresh(&mut self, stream: &Stream) -> Result<usize> {
        if self.origin.as_deref() != Some(stream.path()) {
            return Err(EclError::Argument(format!(
                "index was not built from {}", stream.path().display()
            )));
        }
        if self.lazy {
            self.io = stream.downgrade();
        }
        let resume = self.entries.last().map_or(0, IndexEntry::end_offset);
        let before = self.entries.len();
        let scanned = stream.with_io(|fortio| {
            fortio.seek_end()?;
            fortio.seek_to(resume)?;
            self.scan(fortio, 0)
        });
        let added = match scanned {
            Ok(added) => added,
            Err(e) => {
                self.truncate(before);
                return Err(e);
            }
        };
        debug!(path = %stream.path().display(), added, total = self.entries.len(), "refreshed index");
        Ok(added)
    }

    fn empty(endian: Endian, lazy: bool, origin: Option<PathBuf>, io: Weak<SharedIo>) -> Self {
        Self {
            entries: Vec::new(),
            names:   HashMap::new(),
            order:   Vec::new(),
            cache:   Vec::new(),
            endian,
            lazy,
            origin,
            io,
        }
    }

    /// Walk keywords from the current position to the end of the stream.
    fn scan<S: Read + Seek>(&mut self, fortio: &mut FortIo<S>, segment: usize) -> Result<usize> {
        let before = self.entries.len();
        while !fortio.at_eof()? {
            let offset = fortio.position()?;
            let header = codec::read_header(fortio)?;
            let data_start = fortio.position()?;
            let cell = OnceLock::new();
            let data_len = if self.lazy {
                codec::skip_data(fortio, &header)?
            } else {
                let kw = codec::read_data(fortio, &header)?;
                let _ = cell.set(kw);
                fortio.position()? - data_start
            };
            trace!(name = header.name(), offset, data_len, "indexed keyword");
            let position = self.entries.len();
            self.push(IndexEntry { position, header, offset, data_len, segment }, cell);
        }
        Ok(self.entries.len() - before)
    }

    fn push(&mut self, entry: IndexEntry, cell: OnceLock<Keyword>) {
        let name = entry.name().to_owned();
        let position = entry.position;
        match self.names.get_mut(&name) {
            Some(slots) => slots.push(position),
            None => {
                self.order.push(name.clone());
                self.names.insert(name, vec![position]);
            }
        }
        self.entries.push(entry);
        self.cache.push(cell);
    }

    /// Drop every entry at or after `len`.
    fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
        self.cache.truncate(len);
        self.names.retain(|_, slots| {
            slots.retain(|&p| p < len);
            !slots.is_empty()
        });
        let names = &self.names;
        self.order.retain(|n| names.contains_key(n));
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn endian(&self) -> Endian { self.endian }
    pub fn is_lazy(&self) -> bool { self.lazy }
    pub fn origin(&self) -> Option<&Path> { self.origin.as_deref() }
    pub fn entries(&self) -> &[IndexEntry] { &self.entries }

    pub fn entry(&self, position: usize) -> Result<&IndexEntry> {
        self.entries.get(position).ok_or(EclError::Index {
            index: position as i64,
            len:   self.entries.len(),
        })
    }

    /// Ascending positions of every entry named `name`.
    pub(crate) fn positions(&self, name: &str) -> &[usize] {
        self.names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn distinct_names(&self) -> &[String] { &self.order }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// The view spanning every entry.
    pub fn global_view(&self) -> FileView<'_> {
        FileView::new(self, 0, self.entries.len())
    }

    /// Entry at `i`; negative values count from the end.
    pub fn by_position(&self, i: i64) -> Result<KeywordRef<'_>> {
        self.global_view().by_position(i)
    }

    /// Every entry named `name`, in file order.  `Key` error when none.
    pub fn by_name(&self, name: &str) -> Result<Vec<KeywordRef<'_>>> {
        self.global_view().by_name(name)
    }

    /// The `occurrence`-th entry named `name`.
    pub fn named(&self, name: &str, occurrence: usize) -> Result<KeywordRef<'_>> {
        self.global_view().named(name, occurrence)
    }

    pub fn count_of(&self, name: &str) -> usize { self.positions(name).len() }

    pub fn contains(&self, name: &str) -> bool { self.names.contains_key(name) }

    /// Distinct names in first-seen order.
    pub fn keys(&self) -> Vec<&str> { self.order.iter().map(String::as_str).collect() }

    pub fn iter(&self) -> impl Iterator<Item = KeywordRef<'_>> + '_ {
        (0..self.entries.len()).map(move |p| KeywordRef { index: self, position: p })
    }

    pub fn sub_view(&self, start: &str, stop: Option<&str>, occurrence: usize) -> Result<FileView<'_>> {
        self.global_view().sub_view(start, stop, occurrence)
    }

    // ── Payloads ─────────────────────────────────────────────────────────────

    pub fn is_loaded(&self, position: usize) -> bool {
        self.cache.get(position).map_or(false, |c| c.get().is_some())
    }

    /// Decoded keyword at `position`, reading it from the stream on first
    /// access.
    pub fn load(&self, position: usize) -> Result<&Keyword> {
        let entry = self.entry(position)?;
        let cell = &self.cache[position];
        if let Some(kw) = cell.get() {
            return Ok(kw);
        }
        let kw = self.with_source(|fortio| {
            Self::check_header(fortio, entry)?;
            codec::read_data(fortio, &entry.header)
        })?;
        trace!(name = entry.name(), position, "loaded payload");
        Ok(cell.get_or_init(|| kw))
    }

    /// Decode every payload not yet cached.
    pub fn load_all(&self) -> Result<()> {
        (0..self.entries.len()).try_for_each(|p| self.load(p).map(|_| ()))
    }

    /// Selected elements of the keyword at `position`, without decoding the
    /// rest of its payload.  The result keeps the keyword's name and type.
    pub fn read_elements(&self, position: usize, indices: &[usize]) -> Result<Keyword> {
        let entry = self.entry(position)?;
        let header = &entry.header;
        if let Some(&bad) = indices.iter().find(|&&i| i >= header.count()) {
            return Err(EclError::Index { index: bad as i64, len: header.count() });
        }
        if let Some(kw) = self.cache[position].get() {
            return kw.select(indices);
        }

        let size = header.ecl_type().element_size();
        let subset = KeywordHeader::new(header.name(), indices.len(), header.ecl_type())?;
        if size == 0 {
            return codec::decode_payload(&[], &subset, self.endian);
        }
        let bytes = self.with_source(|fortio| {
            Self::check_header(fortio, entry)?;
            let layout = codec::data_layout(fortio, header)?;
            let mut out = vec![0u8; indices.len() * size];
            for (&i, slot) in indices.iter().zip(out.chunks_exact_mut(size)) {
                let at = locate(&layout, (i * size) as u64).ok_or_else(|| {
                    EclError::format(entry.data_offset(), format!("element {i} of {} is not on disk", header.name()))
                })?;
                fortio.seek_to(at)?;
                fortio.get_mut().read_exact(slot)?;
            }
            Ok(out)
        })?;
        codec::decode_payload(&bytes, &subset, self.endian)
    }

    fn with_source<T>(&self, f: impl FnOnce(&mut FortIo<File>) -> Result<T>) -> Result<T> {
        let io = self.io.upgrade().ok_or(EclError::StreamClosed)?;
        let mut guard = lock(&io);
        let fortio = guard.as_mut().ok_or(EclError::StreamClosed)?;
        f(fortio)
    }

    /// Re-read the header record of `entry` and confirm the file still
    /// agrees with the catalogue.  Leaves the stream at the first data record.
    fn check_header<S: Read + Seek>(fortio: &mut FortIo<S>, entry: &IndexEntry) -> Result<()> {
        fortio.seek_to(entry.offset)?;
        let found = codec::read_header(fortio)?;
        if found != entry.header {
            return Err(EclError::format(entry.offset, format!(
                "index expects {} here, file holds {}", entry.name(), found.name()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for FileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileIndex")
            .field("entries", &self.entries.len())
            .field("distinct", &self.order.len())
            .field("endian", &self.endian)
            .field("lazy", &self.lazy)
            .field("origin", &self.origin)
            .finish()
    }
}

/// File offset of payload byte `byte` given a record layout.
fn locate(layout: &[(u64, usize)], mut byte: u64) -> Option<u64> {
    for &(at, len) in layout {
        if byte < len as u64 {
            return Some(at + byte);
        }
        byte -= len as u64;
    }
    None
}

// ── KeywordRef ────────────────────────────────────────────────────────────────

/// One catalogue entry: the header is always at hand, the payload is
/// decoded on demand.
#[derive(Clone, Copy)]
pub struct KeywordRef<'a> {
    index:    &'a FileIndex,
    position: usize,
}

impl<'a> KeywordRef<'a> {
    pub(crate) fn new(index: &'a FileIndex, position: usize) -> Self {
        Self { index, position }
    }

    pub fn position(&self) -> usize { self.position }
    pub fn entry(&self) -> &'a IndexEntry { &self.index.entries[self.position] }
    pub fn header(&self) -> &'a KeywordHeader { &self.entry().header }
    pub fn name(&self) -> &'a str { self.entry().name() }
    pub fn is_loaded(&self) -> bool { self.index.is_loaded(self.position) }

    pub fn load(&self) -> Result<&'a Keyword> { self.index.load(self.position) }

    pub fn read_elements(&self, indices: &[usize]) -> Result<Keyword> {
        self.index.read_elements(self.position, indices)
    }
}

impl fmt::Debug for KeywordRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.header();
        write!(f, "#{} {} {}x{}", self.position, h.name(), h.count(), h.ecl_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Vec<u8> {
        let mut out = Vec::new();
        for kw in [
            Keyword::new_int("SEQNUM", vec![0]).unwrap(),
            Keyword::new_float("SWAT", vec![0.1; 1500]).unwrap(),
            Keyword::new_char("NAMES", &["A", "B"]).unwrap(),
            Keyword::new_float("SWAT", vec![0.2; 3]).unwrap(),
        ] {
            out.extend(codec::encode(&kw, Endian::Big).unwrap());
        }
        out
    }

    #[test]
    fn entries_follow_file_order() {
        let index = FileIndex::from_reader(Cursor::new(sample()), Endian::Big).unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.keys(), ["SEQNUM", "SWAT", "NAMES"]);
        assert_eq!(index.count_of("SWAT"), 2);
        assert_eq!(index.positions("SWAT"), &[1, 3]);
        for (p, e) in index.entries().iter().enumerate() {
            assert_eq!(e.position, p);
        }
        let e = &index.entries()[1];
        assert_eq!(e.data_len, 1500 * 4 + 2 * 8);
        assert_eq!(index.entries()[2].offset, e.end_offset());
    }

    #[test]
    fn absent_queries_are_distinct_errors() {
        let index = FileIndex::from_reader(Cursor::new(sample()), Endian::Big).unwrap();
        assert!(matches!(index.by_name("PRESSURE"), Err(EclError::Key(_))));
        assert!(matches!(index.by_position(4), Err(EclError::Index { .. })));
        assert!(matches!(index.named("SWAT", 2), Err(EclError::Index { .. })));
        assert_eq!(index.by_position(-1).unwrap().position(), 3);
    }

    #[test]
    fn reader_indexes_are_eager() {
        let index = FileIndex::from_reader(Cursor::new(sample()), Endian::Big).unwrap();
        assert!(!index.is_lazy());
        assert!(index.is_loaded(1));
        let swat = index.named("SWAT", 1).unwrap().load().unwrap();
        assert_eq!(swat.values::<f32>().unwrap(), &[0.2f32; 3]);
    }

    #[test]
    fn element_reads_from_cache() {
        let index = FileIndex::from_reader(Cursor::new(sample()), Endian::Big).unwrap();
        let sub = index.read_elements(2, &[1, 0]).unwrap();
        assert_eq!(sub.strings().unwrap(), ["B", "A"]);
        assert!(index.read_elements(2, &[2]).unwrap_err().is_absent());
    }

    #[test]
    fn broken_files_yield_no_index() {
        let mut bytes = sample();
        bytes.truncate(bytes.len() - 3);
        assert!(FileIndex::from_reader(Cursor::new(bytes), Endian::Big).unwrap_err().is_format());
    }

    #[test]
    fn indexes_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FileIndex>();
        assert_send_sync::<KeywordRef<'static>>();
    }

    #[test]
    fn layout_lookup_spans_records() {
        let layout = [(8, 4000), (4016, 2000)];
        assert_eq!(locate(&layout, 0), Some(8));
        assert_eq!(locate(&layout, 4000), Some(4016));
        assert_eq!(locate(&layout, 5999), Some(6015));
        assert_eq!(locate(&layout, 6000), None);
    }
}
