//! Sampling frequencies.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A sampling frequency.
///
/// Variants are declared shortest first, so the derived ordering is ordering
/// by duration.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Frequency {
    #[strum(serialize = "1min")]
    #[serde(rename = "1min")]
    OneMinute,
    #[strum(serialize = "5min")]
    #[serde(rename = "5min")]
    FiveMinutes,
    #[strum(serialize = "15min")]
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[strum(serialize = "30min")]
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[strum(serialize = "hour")]
    #[serde(rename = "hour")]
    Hour,
    #[strum(serialize = "3hour")]
    #[serde(rename = "3hour")]
    ThreeHours,
    #[strum(serialize = "12hour")]
    #[serde(rename = "12hour")]
    TwelveHours,
    #[strum(serialize = "day")]
    #[serde(rename = "day")]
    Day,
    #[strum(serialize = "week")]
    #[serde(rename = "week")]
    Week,
    #[strum(serialize = "month")]
    #[serde(rename = "month")]
    Month,
}

impl Frequency {
    /// Every frequency, shortest first.
    pub const ALL: [Frequency; 10] = [
        Frequency::OneMinute,
        Frequency::FiveMinutes,
        Frequency::FifteenMinutes,
        Frequency::ThirtyMinutes,
        Frequency::Hour,
        Frequency::ThreeHours,
        Frequency::TwelveHours,
        Frequency::Day,
        Frequency::Week,
        Frequency::Month,
    ];

    /// Fixed length in seconds, `None` for the calendar month.
    pub const fn seconds(self) -> Option<i64> {
        match self {
            Frequency::OneMinute => Some(60),
            Frequency::FiveMinutes => Some(300),
            Frequency::FifteenMinutes => Some(900),
            Frequency::ThirtyMinutes => Some(1_800),
            Frequency::Hour => Some(3_600),
            Frequency::ThreeHours => Some(10_800),
            Frequency::TwelveHours => Some(43_200),
            Frequency::Day => Some(86_400),
            Frequency::Week => Some(604_800),
            Frequency::Month => None,
        }
    }

    /// Fixed length as a [`TimeDelta`], `None` for the calendar month.
    pub fn duration(self) -> Option<TimeDelta> {
        self.seconds().map(TimeDelta::seconds)
    }

    /// Legacy numeric code, a single bit per frequency.
    pub const fn code(self) -> u32 {
        match self {
            Frequency::OneMinute => 1,
            Frequency::FiveMinutes => 2,
            Frequency::FifteenMinutes => 4,
            Frequency::ThirtyMinutes => 8,
            Frequency::Hour => 16,
            Frequency::ThreeHours => 32,
            Frequency::TwelveHours => 128,
            Frequency::Day => 512,
            Frequency::Week => 1024,
            Frequency::Month => 4096,
        }
    }

    /// Look up a frequency by its legacy numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }

    /// Parse a persisted setting value: either a name (`15min`) or a legacy code (`4`).
    pub fn from_setting(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(code) = value.parse::<u32>() {
            return Self::from_code(code);
        }
        value.parse().ok()
    }

    /// Human readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Frequency::OneMinute => "1 minute",
            Frequency::FiveMinutes => "5 minutes",
            Frequency::FifteenMinutes => "15 minutes",
            Frequency::ThirtyMinutes => "30 minutes",
            Frequency::Hour => "1 hour",
            Frequency::ThreeHours => "3 hours",
            Frequency::TwelveHours => "12 hours",
            Frequency::Day => "1 day",
            Frequency::Week => "1 week",
            Frequency::Month => "1 month",
        }
    }
}
