//! One catalogue over a run split into numbered files (`CASE.X0000`,
//! `CASE.X0001`, ... or `CASE.S0001`, ...).

use std::path::Path;
use std::sync::Weak;

use tracing::debug;

use crate::error::{EclError, Result};
use crate::file::{OpenOptions, Stream};
use crate::fortio::Endian;
use crate::index::FileIndex;
use crate::kind::{FileInfo, FileKind};

impl FileIndex {
    /// Index every segment in report-step order.
    ///
    /// Segmented indexes are always eager: each segment is opened, fully
    /// decoded and closed again before the next one.  Every entry records
    /// the segment it came from, counted from zero in sorted order.
    pub fn build_segmented<P: AsRef<Path>>(paths: &[P], endian: Endian) -> Result<Self> {
        let mut segments = paths
            .iter()
            .map(|p| segment_of(p.as_ref()).map(|info| (info, p.as_ref())))
            .collect::<Result<Vec<_>>>()?;
        if segments.is_empty() {
            return Err(EclError::Argument("no segment files given".into()));
        }
        segments.sort_by_key(|(info, _)| info.report_step);

        let kind = segments[0].0.kind;
        if let Some((info, path)) = segments.iter().find(|(info, _)| info.kind != kind) {
            return Err(EclError::Argument(format!(
                "{} is a {:?} segment, expected {kind:?}", path.display(), info.kind
            )));
        }
        if let Some(pair) = segments.windows(2).find(|w| w[0].0.report_step == w[1].0.report_step) {
            return Err(EclError::Argument(format!(
                "{} and {} carry the same report number", pair[0].1.display(), pair[1].1.display()
            )));
        }

        let opts = OpenOptions::new().endian_flip(endian.is_flipped()).lazy(false);
        let mut index = Self::empty(endian, false, None, Weak::new());
        for (segment, (info, path)) in segments.iter().enumerate() {
            let mut stream = Stream::open(path, &opts)?;
            let added = stream.with_io(|fortio| {
                fortio.seek_to(0)?;
                index.scan(fortio, segment)
            })?;
            stream.close()?;
            debug!(path = %path.display(), report_step = ?info.report_step, added, "indexed segment");
        }
        debug!(segments = segments.len(), entries = index.len(), "built segmented index");
        Ok(index)
    }
}

fn segment_of(path: &Path) -> Result<FileInfo> {
    let info = FileKind::from_path(path);
    if info.formatted {
        return Err(EclError::Unsupported(format!(
            "{} is a formatted file", path.display()
        )));
    }
    if !info.kind.is_segment() || info.report_step.is_none() {
        return Err(EclError::Argument(format!(
            "{} is not a numbered restart or summary segment", path.display()
        )));
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kw::Keyword;
    use tempfile::tempdir;

    fn write(path: &Path, step: i32) {
        let mut s = Stream::create(path, true).unwrap();
        s.write_keyword(&Keyword::new_int("SEQNUM", vec![step]).unwrap()).unwrap();
        s.write_keyword(&Keyword::new_float("PRESSURE", vec![step as f32; 4]).unwrap()).unwrap();
    }

    #[test]
    fn segments_are_ordered_by_report_number() {
        let dir = tempdir().unwrap();
        let late = dir.path().join("CASE.X0002");
        let early = dir.path().join("CASE.X0001");
        write(&late, 2);
        write(&early, 1);

        let index = FileIndex::build_segmented(&[&late, &early], Endian::Big).unwrap();
        assert_eq!(index.len(), 4);
        assert!(!index.is_lazy());
        assert_eq!(index.entries()[2].segment, 1);
        let first = index.named("SEQNUM", 0).unwrap().load().unwrap();
        assert_eq!(first.values::<i32>().unwrap(), &[1]);
        let p = index.named("PRESSURE", 1).unwrap().load().unwrap();
        assert_eq!(p.values::<f32>().unwrap(), &[2.0f32; 4]);
    }

    #[test]
    fn formatted_and_foreign_files_are_rejected() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("CASE.F0001");
        assert!(matches!(
            FileIndex::build_segmented(&[&f], Endian::Big),
            Err(EclError::Unsupported(_))
        ));
        let unified = dir.path().join("CASE.UNRST");
        assert!(matches!(
            FileIndex::build_segmented(&[&unified], Endian::Big),
            Err(EclError::Argument(_))
        ));
        let a = dir.path().join("CASE.X0001");
        let b = dir.path().join("CASE.S0002");
        write(&a, 1);
        write(&b, 2);
        assert!(FileIndex::build_segmented(&[&a, &b], Endian::Big).is_err());
    }
}
