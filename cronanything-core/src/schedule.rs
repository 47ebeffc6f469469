//! Cron-expression evaluation against a persisted `(from, now)` window.
//!
//! [`Schedule`] wraps the standard 5-field cron grammar with a fallback to the
//! 6-field (with-seconds) form, matching `spec.schedule` on `CronAnything`.
//! All arithmetic here is pure: callers supply both bounds of the window, there
//! is no wall-clock access anywhere in this module.

use chrono::{DateTime, Utc};
use std::str::FromStr;
use thiserror::Error;

/// A parsed cron expression, evaluated with an exclusive `(from, now)` window.
#[derive(Debug, Clone)]
pub struct Schedule {
    inner: cron::Schedule,
}

/// Failure to parse a cron expression under either the 5- or 6-field grammar.
#[derive(Debug, Error)]
#[error("invalid cron expression {expr:?}: tried 5-field ({five_err}) and 6-field ({six_err})")]
pub struct ScheduleParseError {
    expr: String,
    five_err: String,
    six_err: String,
}

impl FromStr for Schedule {
    type Err = ScheduleParseError;

    /// Parses `expr` as a standard 5-field cron expression (minute hour dom month dow),
    /// falling back to the 6-field with-seconds form on failure.
    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        // The `cron` crate's grammar always carries a leading seconds field, so the
        // "standard" 5-field form is parsed by prepending a literal `0` seconds field.
        let five_field = format!("0 {expr}");
        match cron::Schedule::from_str(&five_field) {
            Ok(inner) => Ok(Schedule { inner }),
            Err(five_err) => match cron::Schedule::from_str(expr) {
                Ok(inner) => Ok(Schedule { inner }),
                Err(six_err) => Err(ScheduleParseError {
                    expr: expr.to_string(),
                    five_err: five_err.to_string(),
                    six_err: six_err.to_string(),
                }),
            },
        }
    }
}

impl Schedule {
    /// Parses a cron expression, see [`FromStr`].
    pub fn parse(expr: &str) -> Result<Self, ScheduleParseError> {
        expr.parse()
    }

    /// Returns the next strictly-greater-than-`from` trigger time.
    pub fn next(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&from).next()
    }

    /// Returns every trigger time `t` with `from < t < now`, in ascending order.
    ///
    /// Both bounds are exclusive: a tick exactly at `from` is never re-fired (it was
    /// already accounted for by whoever set `from`), and a tick exactly at `now` is
    /// deferred to the next reconcile so that in-progress "now" isn't treated as past.
    pub fn missed(&self, from: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        self.inner.after(&from).take_while(|t| *t < now).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_standard_five_field() {
        assert!(Schedule::parse("* * * * *").is_ok());
    }

    #[test]
    fn parses_six_field_with_seconds() {
        assert!(Schedule::parse("*/15 * * * * *").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(Schedule::parse("not a cron expression").is_err());
    }

    #[test]
    fn s1_first_tick_after_creation() {
        let sched = Schedule::parse("* * * * *").unwrap();
        let created = dt("2018-04-20T04:19:00Z");
        let now = dt("2018-04-20T04:20:01Z");
        // Phase E uses now + 1s lookahead.
        let missed = sched.missed(created, now + chrono::Duration::seconds(1));
        assert_eq!(missed, vec![dt("2018-04-20T04:20:00Z")]);
    }

    #[test]
    fn s2_missed_ticks_ascending() {
        let sched = Schedule::parse("* * * * *").unwrap();
        let from = dt("2018-04-20T04:10:00Z");
        let now = dt("2018-04-20T04:21:01Z");
        let missed = sched.missed(from, now + chrono::Duration::seconds(1));
        assert_eq!(missed.len(), 11); // 04:11 .. 04:21 inclusive
        assert_eq!(missed.first().unwrap(), &dt("2018-04-20T04:11:00Z"));
        assert_eq!(missed.last().unwrap(), &dt("2018-04-20T04:21:00Z"));
        for w in missed.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn bounds_are_exclusive() {
        let sched = Schedule::parse("* * * * *").unwrap();
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 5, 0).unwrap();
        // A tick exactly at `from` must not reappear.
        assert!(!sched.missed(t, t + chrono::Duration::minutes(5)).contains(&t));
        // A tick exactly at `now` must not appear either.
        assert!(!sched.missed(t - chrono::Duration::minutes(5), t).contains(&t));
    }

    #[test]
    fn next_is_strictly_greater() {
        let sched = Schedule::parse("* * * * *").unwrap();
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 5, 0).unwrap();
        let n = sched.next(t).unwrap();
        assert!(n > t);
        assert_eq!(n, t + chrono::Duration::minutes(1));
    }
}
