//! Epoch timestamps → calendar days in the reporting timezone.
//!
//! Revenue is attributed to the day the business considers it booked, so
//! every day boundary in the pipeline goes through [`DayNormalizer`]. Neither
//! UTC nor the host's local zone is ever used implicitly.

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::model::DayKey;

/// How a timestamp was turned into a day key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayResolution {
    /// The timestamp converted normally.
    Exact(DayKey),
    /// The timestamp was out of range; the processing day was used instead.
    Fallback(DayKey),
}

impl DayResolution {
    pub fn day(self) -> DayKey {
        match self {
            Self::Exact(day) | Self::Fallback(day) => day,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Converts timestamps to day keys in one fixed timezone.
///
/// Built once per run from "now", which also fixes the processing day used
/// as the soft-failure fallback.
#[derive(Debug, Clone, Copy)]
pub struct DayNormalizer {
    tz: Tz,
    processing_day: DayKey,
}

impl DayNormalizer {
    pub fn new(tz: Tz, now: DateTime<Utc>) -> Self {
        let processing_day = DayKey::new(now.with_timezone(&tz).date_naive());
        Self { tz, processing_day }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn processing_day(&self) -> DayKey {
        self.processing_day
    }

    /// Resolve an epoch-seconds timestamp without logging.
    ///
    /// Timestamps outside chrono's range, or whose civil year falls outside
    /// 1..=9999 (keys must stay fixed-width), resolve to the processing day.
    pub fn resolve(&self, epoch_secs: i64) -> DayResolution {
        match DateTime::from_timestamp(epoch_secs, 0) {
            Some(at) => {
                let local = at.with_timezone(&self.tz).date_naive();
                if (1..=9999).contains(&local.year()) {
                    DayResolution::Exact(DayKey::new(local))
                } else {
                    DayResolution::Fallback(self.processing_day)
                }
            }
            None => DayResolution::Fallback(self.processing_day),
        }
    }

    /// Day key for an epoch-seconds timestamp. Never fails; a fallback is
    /// logged at `warn`. Used for "now"; the classifier calls [`resolve`]
    /// so it can count fallbacks per batch.
    ///
    /// [`resolve`]: DayNormalizer::resolve
    pub fn day_key(&self, epoch_secs: i64) -> DayKey {
        let resolution = self.resolve(epoch_secs);
        if resolution.is_fallback() {
            log::warn!(
                "timestamp {} out of range; attributing to processing day {} ({})",
                epoch_secs,
                self.processing_day,
                self.tz,
            );
        }
        resolution.day()
    }

    /// Epoch seconds of the first instant of `day` in the reporting timezone.
    ///
    /// When local midnight does not exist (DST gap) the first valid instant of
    /// the day is used.
    pub fn start_of_day(&self, day: DayKey) -> i64 {
        let date = day.date();
        for hour in 0..24 {
            let naive = date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN));
            if let Some(at) = self.tz.from_local_datetime(&naive).earliest() {
                return at.timestamp();
            }
        }
        date.and_time(NaiveTime::MIN).and_utc().timestamp()
    }
}
