//! Report steps and simulation time inside restart files.
//!
//! Each `SEQNUM` keyword (one INT, the report step) opens a restart block
//! that runs to the next `SEQNUM` or the end of the view.  Inside a block the
//! first `INTEHEAD` carries the calendar date and the first `DOUBHEAD` the
//! elapsed simulation days.
//!
//! Blocks must be ordered: report step, date and elapsed days may repeat but
//! never go backwards.  A file without any `SEQNUM` simply has no restart
//! points.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{wrap_index, EclError, Result};
use crate::index::KeywordRef;
use crate::kw::Keyword;
use crate::view::FileView;

pub const SEQNUM_KW:   &str = "SEQNUM";
pub const INTEHEAD_KW: &str = "INTEHEAD";
pub const DOUBHEAD_KW: &str = "DOUBHEAD";

// INTEHEAD slots
pub const INTEHEAD_DAY_INDEX:    usize = 64;
pub const INTEHEAD_MONTH_INDEX:  usize = 65;
pub const INTEHEAD_YEAR_INDEX:   usize = 66;
pub const INTEHEAD_HOUR_INDEX:   usize = 206;
pub const INTEHEAD_MINUTE_INDEX: usize = 207;
/// Microseconds within the minute.
pub const INTEHEAD_MICRO_INDEX:  usize = 410;

pub const DOUBHEAD_DAYS_INDEX: usize = 0;

// ── RestartPoint ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestartPoint {
    pub report_step: i32,
    pub sim_days:    Option<f64>,
    pub sim_time:    Option<NaiveDateTime>,
    /// Absolute index position of the opening `SEQNUM`.
    pub start:       usize,
    /// Exclusive end of the block.
    pub end:         usize,
}

/// Locate and decode every restart block in `view`, validating order.
pub fn scan_restart_points(view: FileView<'_>) -> Result<Vec<RestartPoint>> {
    let seqnums = view.positions(SEQNUM_KW);
    let mut points: Vec<RestartPoint> = Vec::with_capacity(seqnums.len());

    for (i, &start) in seqnums.iter().enumerate() {
        let end = seqnums.get(i + 1).copied().unwrap_or(view.end());
        let block = view.slice(start..end)?;
        let point = RestartPoint {
            report_step: report_step(KeywordRef::new(view.index(), start))?,
            sim_time:    first(block, INTEHEAD_KW).map(sim_time).transpose()?,
            sim_days:    first(block, DOUBHEAD_KW).map(sim_days).transpose()?,
            start,
            end,
        };
        if let Some(prev) = points.last() {
            check_order(prev, &point, view.index().entry(start)?.offset)?;
        }
        points.push(point);
    }
    debug!(points = points.len(), "scanned restart points");
    Ok(points)
}

fn first<'a>(block: FileView<'a>, name: &str) -> Option<KeywordRef<'a>> {
    block.positions(name).first().map(|&p| KeywordRef::new(block.index(), p))
}

fn report_step(r: KeywordRef<'_>) -> Result<i32> {
    let kw = r.load()?;
    match kw.values::<i32>() {
        Some(&[step]) => Ok(step),
        _ => Err(malformed(r, "SEQNUM must hold one INT")),
    }
}

fn sim_time(r: KeywordRef<'_>) -> Result<NaiveDateTime> {
    let kw = r.load()?;
    let v = kw.values::<i32>().ok_or_else(|| malformed(r, "INTEHEAD must be INT"))?;
    if v.len() <= INTEHEAD_YEAR_INDEX {
        return Err(malformed(r, "INTEHEAD too short for a date"));
    }
    let slot = |i: usize| v.get(i).copied().unwrap_or(0);
    let (day, month, year) = (v[INTEHEAD_DAY_INDEX], v[INTEHEAD_MONTH_INDEX], v[INTEHEAD_YEAR_INDEX]);
    let micros = slot(INTEHEAD_MICRO_INDEX);
    let (hour, minute) = (slot(INTEHEAD_HOUR_INDEX), slot(INTEHEAD_MINUTE_INDEX));

    let date = u32::try_from(month)
        .ok()
        .zip(u32::try_from(day).ok())
        .and_then(|(m, d)| NaiveDate::from_ymd_opt(year, m, d))
        .ok_or_else(|| malformed(r, &format!("invalid date {year}-{month}-{day}")))?;
    let time = (|| {
        let micros = u32::try_from(micros).ok()?;
        NaiveTime::from_hms_micro_opt(
            u32::try_from(hour).ok()?,
            u32::try_from(minute).ok()?,
            micros / 1_000_000,
            micros % 1_000_000,
        )
    })()
    .ok_or_else(|| malformed(r, &format!("invalid time {hour}:{minute} +{micros}us")))?;
    Ok(date.and_time(time))
}

fn sim_days(r: KeywordRef<'_>) -> Result<f64> {
    let kw = r.load()?;
    kw.values::<f64>()
        .and_then(|v| v.get(DOUBHEAD_DAYS_INDEX).copied())
        .ok_or_else(|| malformed(r, "DOUBHEAD must hold at least one DOUBLE"))
}

fn malformed(r: KeywordRef<'_>, detail: &str) -> EclError {
    EclError::format(r.entry().offset, format!("{} at position {}: {detail}", r.name(), r.position()))
}

/// `offset` is the byte offset of `next`'s SEQNUM.
fn check_order(prev: &RestartPoint, next: &RestartPoint, offset: u64) -> Result<()> {
    let decreased = next.report_step < prev.report_step
        || matches!((prev.sim_time, next.sim_time), (Some(a), Some(b)) if b < a)
        || matches!((prev.sim_days, next.sim_days), (Some(a), Some(b)) if b < a);
    if decreased {
        warn!(prev = prev.report_step, next = next.report_step, position = next.start, "restart points out of order");
        return Err(EclError::format(offset, format!(
            "restart block at position {} (step {}) goes back from step {} at position {}",
            next.start, next.report_step, prev.report_step, prev.start
        )));
    }
    Ok(())
}

// ── Query ─────────────────────────────────────────────────────────────────────

/// Exactly one selector must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RestartQuery {
    pub report_step: Option<i32>,
    pub sim_time:    Option<NaiveDateTime>,
    pub sim_days:    Option<f64>,
}

impl RestartQuery {
    pub fn report_step(step: i32) -> Self { Self { report_step: Some(step), ..Self::default() } }
    pub fn sim_time(time: NaiveDateTime) -> Self { Self { sim_time: Some(time), ..Self::default() } }
    pub fn sim_days(days: f64) -> Self { Self { sim_days: Some(days), ..Self::default() } }

    fn selector(&self) -> Result<Selector> {
        match (self.report_step, self.sim_time, self.sim_days) {
            (Some(s), None, None) => Ok(Selector::ReportStep(s)),
            (None, Some(t), None) => Ok(Selector::SimTime(t)),
            (None, None, Some(d)) => Ok(Selector::SimDays(d)),
            (None, None, None)    => Err(EclError::Argument("no restart selector given".into())),
            _ => Err(EclError::Argument("give exactly one of report_step, sim_time, sim_days".into())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Selector {
    ReportStep(i32),
    SimTime(NaiveDateTime),
    SimDays(f64),
}

impl Selector {
    fn matches(self, p: &RestartPoint) -> bool {
        match self {
            Selector::ReportStep(s) => p.report_step == s,
            Selector::SimTime(t)    => p.sim_time == Some(t),
            Selector::SimDays(d)    => p.sim_days == Some(d),
        }
    }
}

// ── RestartResolver ───────────────────────────────────────────────────────────

/// Restart points of a view, scanned once.
#[derive(Debug, Clone)]
pub struct RestartResolver<'a> {
    view:   FileView<'a>,
    points: Vec<RestartPoint>,
}

impl<'a> RestartResolver<'a> {
    pub fn new(view: FileView<'a>) -> Result<Self> {
        Ok(Self { view, points: scan_restart_points(view)? })
    }

    pub fn points(&self) -> &[RestartPoint] { &self.points }
    pub fn is_restart(&self) -> bool { !self.points.is_empty() }

    /// The block matching `query`; the first one when several match.
    pub fn resolve(&self, query: &RestartQuery) -> Result<FileView<'a>> {
        let selector = query.selector()?;
        let point = self
            .points
            .iter()
            .find(|p| selector.matches(p))
            .ok_or_else(|| EclError::Lookup(format!("no restart block matches {selector:?}")))?;
        self.view.slice(point.start..point.end)
    }

    /// The `n`-th block in file order; negative values count from the end.
    pub fn view_at(&self, n: i64) -> Result<FileView<'a>> {
        let point = &self.points[wrap_index(n, self.points.len())?];
        self.view.slice(point.start..point.end)
    }

    pub fn has_report_step(&self, step: i32) -> bool {
        self.points.iter().any(|p| p.report_step == step)
    }

    pub fn has_sim_time(&self, time: NaiveDateTime) -> bool {
        self.points.iter().any(|p| p.sim_time == Some(time))
    }

    pub fn report_steps(&self) -> Vec<i32> {
        self.points.iter().map(|p| p.report_step).collect()
    }
}

/// One-shot form of [`RestartResolver::resolve`].
pub fn resolve<'a>(view: FileView<'a>, query: &RestartQuery) -> Result<FileView<'a>> {
    RestartResolver::new(view)?.resolve(query)
}

/// Build an `INTEHEAD` carrying `time`, other slots zero.
pub fn intehead_for(time: NaiveDateTime) -> Result<Keyword> {
    use chrono::{Datelike, Timelike};
    let mut v = vec![0i32; INTEHEAD_MICRO_INDEX + 1];
    v[INTEHEAD_DAY_INDEX]    = time.day() as i32;
    v[INTEHEAD_MONTH_INDEX]  = time.month() as i32;
    v[INTEHEAD_YEAR_INDEX]   = time.year();
    v[INTEHEAD_HOUR_INDEX]   = time.hour() as i32;
    v[INTEHEAD_MINUTE_INDEX] = time.minute() as i32;
    v[INTEHEAD_MICRO_INDEX]  = (time.second() * 1_000_000 + time.nanosecond() / 1_000) as i32;
    Keyword::new_int(INTEHEAD_KW, v)
}
