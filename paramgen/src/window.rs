// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! The update period is cut into fixed-width, day-stepped buckets. Every
//! bucket boundary is a `date_limit` at which the candidate extraction of a
//! query type is repeated.
//!
//! The first bucket always starts at the beginning of the period, even when
//! the period is empty: that pass creates the accumulated relation, so a
//! schedule yields at least one bucket.
//!
//! | start      | end        | width | buckets                             |
//! |------------|------------|-------|-------------------------------------|
//! | 2012-11-28 | 2012-12-01 | 1     | 2012-11-28, 2012-11-29, 2012-11-30  |
//! | 2012-11-28 | 2012-12-01 | 2     | 2012-11-28, 2012-11-30              |
//! | 2012-11-28 | 2012-11-28 | 1     | 2012-11-28                          |

use crate::error::{ParamgenError, Result};
use chrono::{Duration, NaiveDate};

/// A day-stepped sequence of bucket boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSchedule {
    start: NaiveDate,
    end:   NaiveDate,
    width: i64,
}

impl BucketSchedule {
    /// Creates a schedule from `start` (inclusive) to `end` (exclusive) in
    /// steps of `width_days`.
    pub fn new(start: NaiveDate, end: NaiveDate, width_days: i64) -> Result<Self> {
        if width_days <= 0 {
            return Err(ParamgenError::Config(format!(
                "time bucket size must be a positive number of days, got {}",
                width_days
            )));
        }
        Ok(BucketSchedule {
            start,
            end,
            width: width_days,
        })
    }

    /// The first day of the period.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// The day at which the schedule stops.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// The bucket width in days.
    pub fn width_days(&self) -> i64 {
        self.width
    }

    /// Returns the bucket boundaries in order.
    pub fn buckets(&self) -> Buckets {
        Buckets {
            next:     Some(self.start),
            end:      self.end,
            width:    Duration::days(self.width),
            is_first: true,
        }
    }

    /// The number of extraction passes the schedule produces.
    pub fn len(&self) -> usize {
        self.buckets().count()
    }

    /// A schedule is never empty: the creation pass always runs.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Iterator over the bucket boundaries of a [`BucketSchedule`].
#[derive(Debug, Clone)]
pub struct Buckets {
    next:     Option<NaiveDate>,
    end:      NaiveDate,
    width:    Duration,
    is_first: bool,
}

impl Iterator for Buckets {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        if !self.is_first && current >= self.end {
            self.next = None;
            return None;
        }
        self.is_first = false;
        self.next = current.checked_add_signed(self.width);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn daily_buckets_cover_the_period() -> Result<()> {
        let schedule = BucketSchedule::new(date("2012-11-28"), date("2012-12-01"), 1)?;
        let buckets: Vec<_> = schedule.buckets().collect();
        assert_eq!(
            vec![date("2012-11-28"), date("2012-11-29"), date("2012-11-30")],
            buckets
        );
        Ok(())
    }

    #[test]
    fn wide_buckets_round_up() -> Result<()> {
        // 34 days in steps of 5 need ceil(34 / 5) = 7 passes.
        let schedule = BucketSchedule::new(date("2012-11-28"), date("2013-01-01"), 5)?;
        assert_eq!(7, schedule.len());

        let last = schedule.buckets().last().unwrap();
        assert_eq!(date("2012-12-28"), last);
        assert!(last < schedule.end());
        Ok(())
    }

    #[test]
    fn empty_period_still_runs_the_creation_pass() -> Result<()> {
        let day = date("2012-11-28");
        let schedule = BucketSchedule::new(day, day, 1)?;
        assert_eq!(vec![day], schedule.buckets().collect::<Vec<_>>());

        let schedule = BucketSchedule::new(date("2013-01-01"), day, 7)?;
        assert_eq!(vec![date("2013-01-01")], schedule.buckets().collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn non_positive_width_is_rejected() {
        let day = date("2012-11-28");
        assert!(matches!(
            BucketSchedule::new(day, day, 0),
            Err(ParamgenError::Config(_))
        ));
        assert!(BucketSchedule::new(day, day, -3).is_err());
    }
}
