use chrono::{Local, NaiveDateTime};

const ACTIVITY_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Source of wall-clock time for lifecycle rules and the sweeper.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock, matching how activity times are entered by administrators.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

impl<F> Clock for F
where
    F: Fn() -> NaiveDateTime + Send + Sync,
{
    fn now(&self) -> NaiveDateTime {
        self()
    }
}

/// Parse `YYYY-MM-DD HH:MM[:SS]`, also accepting a `T` separator.
pub fn parse_activity_time(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let value = raw.trim().replace('T', " ");
    let [with_seconds, minutes_only] = ACTIVITY_TIME_FORMATS;
    NaiveDateTime::parse_from_str(&value, with_seconds)
        .or_else(|_| NaiveDateTime::parse_from_str(&value, minutes_only))
}
