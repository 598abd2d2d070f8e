//! Reference timezone: a fixed UTC offset or a named IANA zone.

use std::fmt;

use chrono::{FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::{Tz, TzOffset};

/// Timezone the sampling grids are laid out in.
///
/// Named zones follow their daylight-saving rules, so day, week and month
/// ticks stay on local midnight across offset changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceZone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl ReferenceZone {
    /// The UTC reference zone.
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// Offset from UTC in seconds at `at`.
    pub fn offset_seconds_at(&self, at: chrono::DateTime<Utc>) -> i32 {
        self.offset_from_utc_datetime(&at.naive_utc())
            .fix()
            .local_minus_utc()
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        Self::utc()
    }
}

impl From<FixedOffset> for ReferenceZone {
    fn from(offset: FixedOffset) -> Self {
        Self::Fixed(offset)
    }
}

impl From<Tz> for ReferenceZone {
    fn from(tz: Tz) -> Self {
        Self::Named(tz)
    }
}

impl fmt::Display for ReferenceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(offset) => write!(f, "{}", offset),
            Self::Named(tz) => f.write_str(tz.name()),
        }
    }
}

/// Offset of a [`ReferenceZone`] at some instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneOffset {
    Fixed(FixedOffset),
    Named(TzOffset),
}

impl Offset for ZoneOffset {
    fn fix(&self) -> FixedOffset {
        match self {
            Self::Fixed(offset) => *offset,
            Self::Named(offset) => offset.fix(),
        }
    }
}

impl fmt::Display for ZoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(offset) => write!(f, "{}", offset),
            Self::Named(offset) => write!(f, "{}", offset),
        }
    }
}

impl TimeZone for ReferenceZone {
    type Offset = ZoneOffset;

    fn from_offset(offset: &ZoneOffset) -> Self {
        match offset {
            ZoneOffset::Fixed(offset) => Self::Fixed(*offset),
            ZoneOffset::Named(offset) => Self::Named(Tz::from_offset(offset)),
        }
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<ZoneOffset> {
        self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<ZoneOffset> {
        match self {
            Self::Fixed(offset) => offset
                .offset_from_local_datetime(local)
                .map(ZoneOffset::Fixed),
            Self::Named(tz) => tz.offset_from_local_datetime(local).map(ZoneOffset::Named),
        }
    }

    fn offset_from_utc_date(&self, utc: &NaiveDate) -> ZoneOffset {
        self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
    }

    fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> ZoneOffset {
        match self {
            Self::Fixed(offset) => ZoneOffset::Fixed(offset.offset_from_utc_datetime(utc)),
            Self::Named(tz) => ZoneOffset::Named(tz.offset_from_utc_datetime(utc)),
        }
    }
}
