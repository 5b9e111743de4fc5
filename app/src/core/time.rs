use std::fmt::Display;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};

/// Elapsed time of a charging session, shown as zero-padded `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionDuration {
    secs: u64,
}

impl SessionDuration {
    pub fn from_secs(secs: u64) -> Self {
        Self { secs }
    }

    pub fn hours(&self) -> u64 {
        self.secs / 3600
    }

    pub fn minutes(&self) -> u64 {
        (self.secs % 3600) / 60
    }

    pub fn seconds(&self) -> u64 {
        self.secs % 60
    }
}

impl Display for SessionDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours(), self.minutes(), self.seconds())
    }
}

/// Wall-clock time of day as used by the charge schedule (`H:MM` or `HH:MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime(NaiveTime);

impl FromStr for ClockTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !(4..=5).contains(&s.len()) {
            anyhow::bail!("Time of day must be 4 to 5 characters, got {:?}", s);
        }

        NaiveTime::parse_from_str(s, "%H:%M")
            .map(Self)
            .map_err(|e| anyhow::anyhow!("Invalid time of day {:?}: {}", s, e))
    }
}

impl Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

/// Seconds between two `HH:MM:SS` readings of the device clock, `None` if either does not parse.
pub fn clock_distance_secs(a: &str, b: &str) -> Option<i64> {
    let a = NaiveTime::parse_from_str(a.trim(), "%H:%M:%S").ok()?;
    let b = NaiveTime::parse_from_str(b.trim(), "%H:%M:%S").ok()?;
    Some((b - a).num_seconds().abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_duration_is_zero_padded() {
        assert_eq!(SessionDuration::from_secs(0).to_string(), "00:00:00");
        assert_eq!(SessionDuration::from_secs(3725).to_string(), "01:02:05");
        assert_eq!(SessionDuration::from_secs(359_999).to_string(), "99:59:59");
    }

    #[test]
    fn session_duration_components_follow_integer_division() {
        for secs in [1, 59, 60, 61, 3599, 3600, 86_399, 123_456, 359_999] {
            let d = SessionDuration::from_secs(secs);
            assert_eq!(d.hours(), secs / 3600);
            assert_eq!(d.minutes(), (secs % 3600) / 60);
            assert_eq!(d.seconds(), secs % 60);
            assert_eq!(
                d.to_string(),
                format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
            );
        }
    }

    #[test]
    fn clock_time_accepts_short_and_long_form() {
        assert_eq!("7:30".parse::<ClockTime>().unwrap(), "07:30".parse::<ClockTime>().unwrap());
        assert_eq!("23:00".parse::<ClockTime>().unwrap().to_string(), "23:00");
        assert_eq!("7:05".parse::<ClockTime>().unwrap().to_string(), "07:05");
    }

    #[test]
    fn clock_time_rejects_garbage() {
        assert!("24:00".parse::<ClockTime>().is_err());
        assert!("7".parse::<ClockTime>().is_err());
        assert!("07:00:00".parse::<ClockTime>().is_err());
        assert!("ab:cd".parse::<ClockTime>().is_err());
    }

    #[test]
    fn clock_distance() {
        assert_eq!(clock_distance_secs("12:00:00", "12:00:02"), Some(2));
        assert_eq!(clock_distance_secs("12:00:05", "12:00:00"), Some(5));
        assert_eq!(clock_distance_secs("12:00:00", "garbage"), None);
    }
}
