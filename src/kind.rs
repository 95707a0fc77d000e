//! File kind detection from the file name extension.
//!
//! | Extension            | Kind                 |
//! |----------------------|----------------------|
//! | `UNRST` / `FUNRST`   | unified restart      |
//! | `UNSMRY` / `FUNSMRY` | unified summary      |
//! | `SMSPEC` / `FSMSPEC` | summary header       |
//! | `GRID` / `FGRID`     | grid                 |
//! | `EGRID` / `FEGRID`   | extended grid        |
//! | `INIT` / `FINIT`     | init                 |
//! | `RFT` / `FRFT`       | RFT                  |
//! | `DATA`               | simulator input deck |
//! | `Xnnnn` / `Fnnnn`    | restart segment      |
//! | `Snnnn` / `Annnn`    | summary segment      |
//!
//! The leading `F` (or `F`/`A` for segments) marks the formatted ASCII
//! variant.  Matching ignores case.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Restart,
    UnifiedRestart,
    Summary,
    UnifiedSummary,
    SummaryHeader,
    Grid,
    EGrid,
    Init,
    Rft,
    Data,
    Other,
}

/// What a file name says about its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub kind:        FileKind,
    pub formatted:   bool,
    /// Report number of a restart or summary segment.
    pub report_step: Option<u32>,
}

impl FileKind {
    pub fn from_path<P: AsRef<Path>>(path: P) -> FileInfo {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_uppercase)
            .unwrap_or_default();
        Self::from_extension(&ext)
    }

    fn from_extension(ext: &str) -> FileInfo {
        let plain = |kind| FileInfo { kind, formatted: false, report_step: None };
        let fmt   = |kind| FileInfo { kind, formatted: true,  report_step: None };
        match ext {
            "UNRST"   => plain(FileKind::UnifiedRestart),
            "FUNRST"  => fmt(FileKind::UnifiedRestart),
            "UNSMRY"  => plain(FileKind::UnifiedSummary),
            "FUNSMRY" => fmt(FileKind::UnifiedSummary),
            "SMSPEC"  => plain(FileKind::SummaryHeader),
            "FSMSPEC" => fmt(FileKind::SummaryHeader),
            "GRID"    => plain(FileKind::Grid),
            "FGRID"   => fmt(FileKind::Grid),
            "EGRID"   => plain(FileKind::EGrid),
            "FEGRID"  => fmt(FileKind::EGrid),
            "INIT"    => plain(FileKind::Init),
            "FINIT"   => fmt(FileKind::Init),
            "RFT"     => plain(FileKind::Rft),
            "FRFT"    => fmt(FileKind::Rft),
            "DATA"    => plain(FileKind::Data),
            _ => Self::segment(ext).unwrap_or(plain(FileKind::Other)),
        }
    }

    fn segment(ext: &str) -> Option<FileInfo> {
        let (tag, digits) = (ext.get(..1)?, ext.get(1..)?);
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let (kind, formatted) = match tag {
            "X" => (FileKind::Restart, false),
            "F" => (FileKind::Restart, true),
            "S" => (FileKind::Summary, false),
            "A" => (FileKind::Summary, true),
            _ => return None,
        };
        Some(FileInfo { kind, formatted, report_step: digits.parse().ok() })
    }

    /// Restart and summary data split one file per report step.
    pub fn is_segment(self) -> bool {
        matches!(self, FileKind::Restart | FileKind::Summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_and_static_files() {
        let i = FileKind::from_path("/runs/CASE.UNRST");
        assert_eq!((i.kind, i.formatted, i.report_step), (FileKind::UnifiedRestart, false, None));
        assert!(FileKind::from_path("CASE.FEGRID").formatted);
        assert_eq!(FileKind::from_path("case.init").kind, FileKind::Init);
        assert_eq!(FileKind::from_path("CASE.DATA").kind, FileKind::Data);
        assert_eq!(FileKind::from_path("CASE").kind, FileKind::Other);
        assert_eq!(FileKind::from_path("CASE.TXT").kind, FileKind::Other);
    }

    #[test]
    fn segments_carry_report_numbers() {
        let x = FileKind::from_path("CASE.X0012");
        assert_eq!(x, FileInfo { kind: FileKind::Restart, formatted: false, report_step: Some(12) });
        let a = FileKind::from_path("CASE.A0003");
        assert_eq!(a, FileInfo { kind: FileKind::Summary, formatted: true, report_step: Some(3) });
        assert_eq!(FileKind::from_path("CASE.X12").kind, FileKind::Other);
        assert_eq!(FileKind::from_path("CASE.Q0001").kind, FileKind::Other);
        assert!(FileKind::Summary.is_segment());
        assert!(!FileKind::Init.is_segment());
    }
}
