//! Windows over a [`FileIndex`].
//!
//! A [`FileView`] is a half-open range `[start, end)` of index positions.
//! It copies nothing and borrows the index, so it cannot outlive it.  Name
//! lookups through a view only see entries inside its range, and positions
//! passed to or returned from a view are relative to the view while
//! [`KeywordRef::position`] stays absolute.

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

use crate::error::{wrap_index, EclError, Result};
use crate::index::{FileIndex, KeywordRef};
use crate::kw::Keyword;

#[derive(Clone, Copy)]
pub struct FileView<'a> {
    index: &'a FileIndex,
    start: usize,
    end:   usize,
}

impl<'a> FileView<'a> {
    pub(crate) fn new(index: &'a FileIndex, start: usize, end: usize) -> Self {
        debug_assert!(start <= end && end <= index.len());
        Self { index, start, end }
    }

    pub fn index(&self) -> &'a FileIndex { self.index }
    pub fn start(&self) -> usize { self.start }
    pub fn end(&self) -> usize { self.end }
    pub fn range(&self) -> Range<usize> { self.start..self.end }
    pub fn len(&self) -> usize { self.end - self.start }
    pub fn is_empty(&self) -> bool { self.start == self.end }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Entry `i` of the view; negative values count from the end.
    pub fn by_position(&self, i: i64) -> Result<KeywordRef<'a>> {
        let p = wrap_index(i, self.len())?;
        Ok(KeywordRef::new(self.index, self.start + p))
    }

    /// Absolute positions of `name` inside the view, ascending.
    pub fn positions(&self, name: &str) -> &'a [usize] {
        let all = self.index.positions(name);
        let lo = all.partition_point(|&p| p < self.start);
        let hi = all.partition_point(|&p| p < self.end);
        &all[lo..hi]
    }

    pub fn by_name(&self, name: &str) -> Result<Vec<KeywordRef<'a>>> {
        let found = self.positions(name);
        if found.is_empty() {
            return Err(EclError::Key(name.to_owned()));
        }
        Ok(found.iter().map(|&p| KeywordRef::new(self.index, p)).collect())
    }

    pub fn named(&self, name: &str, occurrence: usize) -> Result<KeywordRef<'a>> {
        let found = self.positions(name);
        if found.is_empty() {
            return Err(EclError::Key(name.to_owned()));
        }
        let p = found.get(occurrence).ok_or(EclError::Index {
            index: occurrence as i64,
            len:   found.len(),
        })?;
        Ok(KeywordRef::new(self.index, *p))
    }

    pub fn count_of(&self, name: &str) -> usize { self.positions(name).len() }

    pub fn contains(&self, name: &str) -> bool { !self.positions(name).is_empty() }

    /// Distinct names in first-seen order.
    pub fn keys(&self) -> Vec<&'a str> {
        if self.start == 0 && self.end == self.index.len() {
            return self.index.distinct_names().iter().map(String::as_str).collect();
        }
        let mut seen = HashSet::new();
        self.index.entries()[self.start..self.end]
            .iter()
            .map(|e| e.name())
            .filter(|n| seen.insert(*n))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = KeywordRef<'a>> + 'a {
        let index = self.index;
        self.range().map(move |p| KeywordRef::new(index, p))
    }

    /// Decode every payload in the view, in order.
    pub fn load_all(&self) -> Result<Vec<&'a Keyword>> {
        self.iter().map(|r| r.load()).collect()
    }

    // ── Sub-views ────────────────────────────────────────────────────────────

    /// From the `occurrence`-th `start` entry up to, not including, the first
    /// `stop` entry after it.  Without a `stop`, or when no `stop` follows,
    /// the range runs to the end of this view.
    pub fn sub_view(&self, start: &str, stop: Option<&str>, occurrence: usize) -> Result<FileView<'a>> {
        let from = self.named(start, occurrence)?.position();
        let to = match stop {
            Some(stop) => {
                let after = self.positions(stop);
                let i = after.partition_point(|&p| p <= from);
                after.get(i).copied().unwrap_or(self.end)
            }
            None => self.end,
        };
        Ok(FileView::new(self.index, from, to))
    }

    /// The block opened by the `occurrence`-th `name`, running to the next
    /// `name`.
    pub fn block(&self, name: &str, occurrence: usize) -> Result<FileView<'a>> {
        self.sub_view(name, Some(name), occurrence)
    }

    /// A view over absolute positions `range`, which must lie inside this
    /// view.
    pub fn slice(&self, range: Range<usize>) -> Result<FileView<'a>> {
        if range.start > range.end || range.start < self.start || range.end > self.end {
            return Err(EclError::Argument(format!(
                "range {range:?} is not inside view {:?}", self.range()
            )));
        }
        Ok(FileView::new(self.index, range.start, range.end))
    }
}

impl fmt::Debug for FileView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileView")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

impl<'a> IntoIterator for FileView<'a> {
    type Item = KeywordRef<'a>;
    type IntoIter = Box<dyn Iterator<Item = KeywordRef<'a>> + 'a>;

    fn into_iter(self) -> Self::IntoIter { Box::new(self.iter()) }
}
