//! Time window resolution for range queries over `createdAt`.
//!
//! # Responsibility
//! - Turn caller-supplied date strings and relative range tokens into
//!   concrete instant bounds.
//! - Keep all wall-clock interpretation in one configurable time zone.
//!
//! # Invariants
//! - Explicit windows are inclusive on both ends.
//! - Generic date-time inputs are minute-normalized: start boundaries get
//!   second `00`, end boundaries get second `59`.
//! - Relative windows are bounded on both sides only when anchored; an
//!   unanchored relative window has no upper bound.
//! - `1d` subtracts one calendar day on the wall clock, not 24 hours.

use crate::repo::node_repo::CreatedAtRange;
use chrono::{DateTime, Days, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Literal boundary format accepted by explicit windows.
pub const BOUNDARY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

const START_SECOND: &str = "00";
const END_SECOND: &str = "59";

const GENERIC_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Window resolution failures. All of them are caller input errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    InvalidDateFormat(String),
    InvalidTimeRange(String),
    /// The computed wall-clock time has no representable instant.
    OutOfRange(String),
}

impl Display for WindowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDateFormat(raw) => {
                write!(f, "invalid date format `{raw}`; expected dd/mm/yyyy hh:mm:ss")
            }
            Self::InvalidTimeRange(token) => {
                write!(f, "invalid timeRange value `{token}`; expected 1h|5h|1d")
            }
            Self::OutOfRange(value) => write!(f, "date-time out of range: {value}"),
        }
    }
}

impl Error for WindowError {}

/// Supported relative range tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeRange {
    OneHour,
    FiveHours,
    OneDay,
}

impl RelativeRange {
    pub fn token(self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::FiveHours => "5h",
            Self::OneDay => "1d",
        }
    }
}

impl FromStr for RelativeRange {
    type Err = WindowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "1h" => Ok(Self::OneHour),
            "5h" => Ok(Self::FiveHours),
            "1d" => Ok(Self::OneDay),
            other => Err(WindowError::InvalidTimeRange(other.to_string())),
        }
    }
}

/// Caller-supplied window input, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeWindow {
    /// Absolute `[start, end]` range.
    Explicit { start: String, end: String },
    /// `time_range` token ending at `anchor`, or at "now" when absent.
    Relative {
        time_range: String,
        anchor: Option<String>,
    },
}

/// Concrete instant bounds ready for a store filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl ResolvedWindow {
    pub fn to_range(self) -> CreatedAtRange {
        CreatedAtRange {
            gte: Some(self.start),
            lte: self.end,
        }
    }
}

/// Resolves [`TimeWindow`] inputs in a fixed wall-clock zone.
#[derive(Debug, Clone)]
pub struct TimeWindowResolver<Tz: TimeZone> {
    tz: Tz,
    now: fn() -> DateTime<Utc>,
}

impl TimeWindowResolver<Local> {
    /// Resolver using the host's local time zone.
    pub fn local() -> Self {
        Self::new(Local)
    }
}

impl TimeWindowResolver<Utc> {
    pub fn utc() -> Self {
        Self::new(Utc)
    }
}

impl<Tz: TimeZone> TimeWindowResolver<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz, now: Utc::now }
    }

    /// Replaces the "now" source used by unanchored relative windows.
    pub fn with_now(mut self, now: fn() -> DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now)()
    }

    /// Resolves either window shape into concrete bounds.
    pub fn resolve(&self, window: &TimeWindow) -> Result<ResolvedWindow, WindowError> {
        match window {
            TimeWindow::Explicit { start, end } => Ok(ResolvedWindow {
                start: self.normalize_boundary(start, false)?,
                end: Some(self.normalize_boundary(end, true)?),
            }),
            TimeWindow::Relative { time_range, anchor } => {
                let range = time_range.parse::<RelativeRange>()?;
                self.resolve_relative(range, anchor.as_deref())
            }
        }
    }

    /// Resolves a relative range ending at `anchor` or at the current instant.
    pub fn resolve_relative(
        &self,
        range: RelativeRange,
        anchor: Option<&str>,
    ) -> Result<ResolvedWindow, WindowError> {
        let anchored_end = anchor.map(|raw| self.parse_instant(raw)).transpose()?;
        let end = anchored_end.unwrap_or_else(|| self.now());

        let start = match range {
            RelativeRange::OneHour => end - Duration::hours(1),
            RelativeRange::FiveHours => end - Duration::hours(5),
            RelativeRange::OneDay => {
                let wall = end.with_timezone(&self.tz).naive_local();
                let previous = wall
                    .checked_sub_days(Days::new(1))
                    .ok_or_else(|| WindowError::OutOfRange(wall.to_string()))?;
                self.wall_to_instant(previous)?
            }
        };

        Ok(ResolvedWindow {
            start,
            end: anchored_end,
        })
    }

    /// Parses a strict `dd/mm/yyyy hh:mm:ss` wall-clock string.
    pub fn parse_boundary(&self, raw: &str) -> Result<DateTime<Utc>, WindowError> {
        let wall = parse_boundary_wall(raw)
            .ok_or_else(|| WindowError::InvalidDateFormat(raw.to_string()))?;
        self.wall_to_instant(wall)
    }

    /// Converts a raw boundary input into an instant.
    ///
    /// Strings already in the literal boundary format are taken as-is. Any
    /// other recognized date-time is first reformatted to that format with
    /// the second forced to `00` (start) or `59` (end), then parsed back.
    pub fn normalize_boundary(&self, raw: &str, is_end: bool) -> Result<DateTime<Utc>, WindowError> {
        if parse_boundary_wall(raw).is_some() {
            return self.parse_boundary(raw);
        }

        let wall = self
            .parse_generic_wall(raw)
            .ok_or_else(|| WindowError::InvalidDateFormat(raw.to_string()))?;
        self.parse_boundary(&format_boundary(wall, is_end))
    }

    /// Parses an instant without minute normalization.
    ///
    /// Used for relative-window anchors and device-store bounds.
    pub fn parse_instant(&self, raw: &str) -> Result<DateTime<Utc>, WindowError> {
        if let Some(wall) = parse_boundary_wall(raw) {
            return self.wall_to_instant(wall);
        }

        let trimmed = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(parsed.with_timezone(&Utc));
        }

        let wall = self
            .parse_generic_wall(raw)
            .ok_or_else(|| WindowError::InvalidDateFormat(raw.to_string()))?;
        self.wall_to_instant(wall)
    }

    fn parse_generic_wall(&self, raw: &str) -> Option<NaiveDateTime> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(parsed.with_timezone(&self.tz).naive_local());
        }

        for format in GENERIC_NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Some(naive);
            }
        }

        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    fn wall_to_instant(&self, wall: NaiveDateTime) -> Result<DateTime<Utc>, WindowError> {
        if let Some(local) = self.tz.from_local_datetime(&wall).earliest() {
            return Ok(local.with_timezone(&Utc));
        }

        // Skipped wall time (DST gap): move past the gap.
        let shifted = wall + Duration::hours(1);
        self.tz
            .from_local_datetime(&shifted)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| WindowError::OutOfRange(wall.to_string()))
    }
}

/// Formats a wall-clock time as a boundary string at minute precision.
///
/// The second field is `59` for end boundaries and `00` otherwise.
pub fn format_boundary(wall: NaiveDateTime, is_end: bool) -> String {
    let second = if is_end { END_SECOND } else { START_SECOND };
    format!("{}:{second}", wall.format("%d/%m/%Y %H:%M"))
}

fn parse_boundary_wall(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let parsed = NaiveDateTime::parse_from_str(trimmed, BOUNDARY_FORMAT).ok()?;
    // chrono accepts unpadded fields; the literal format does not.
    if parsed.format(BOUNDARY_FORMAT).to_string() != trimmed {
        return None;
    }
    Some(parsed)
}
