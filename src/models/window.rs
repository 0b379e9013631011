use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative time range a trader query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "2h")]
    Hours2,
    #[serde(rename = "6h")]
    Hours6,
    #[serde(rename = "24h")]
    Hours24,
    #[serde(rename = "3d")]
    Days3,
    #[serde(rename = "7d")]
    Days7,
    #[serde(rename = "30d")]
    Days30,
}

const HOUR: i64 = 60 * 60;
const DAY: i64 = 24 * HOUR;

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::All => "all",
            TimeWindow::Hours2 => "2h",
            TimeWindow::Hours6 => "6h",
            TimeWindow::Hours24 => "24h",
            TimeWindow::Days3 => "3d",
            TimeWindow::Days7 => "7d",
            TimeWindow::Days30 => "30d",
        }
    }

    pub fn from_key(key: &str) -> Option<TimeWindow> {
        match key {
            "all" => Some(TimeWindow::All),
            "2h" => Some(TimeWindow::Hours2),
            "6h" => Some(TimeWindow::Hours6),
            "24h" => Some(TimeWindow::Hours24),
            "3d" => Some(TimeWindow::Days3),
            "7d" => Some(TimeWindow::Days7),
            "30d" => Some(TimeWindow::Days30),
            _ => None,
        }
    }

    /// Unrecognised windows cover the whole token history
    pub fn parse_lenient(key: &str) -> TimeWindow {
        Self::from_key(key).unwrap_or_else(|| {
            log::warn!("Unknown time filter '{}', using full history", key);
            TimeWindow::All
        })
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        match self {
            TimeWindow::All => None,
            TimeWindow::Hours2 => Some(2 * HOUR),
            TimeWindow::Hours6 => Some(6 * HOUR),
            TimeWindow::Hours24 => Some(24 * HOUR),
            TimeWindow::Days3 => Some(3 * DAY),
            TimeWindow::Days7 => Some(7 * DAY),
            TimeWindow::Days30 => Some(30 * DAY),
        }
    }

    /// Unix timestamp the window starts at, or None for the full history
    pub fn start_timestamp(&self, now_unix: i64) -> Option<i64> {
        self.duration_seconds().map(|d| now_unix - d)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_timestamps() {
        let now = 1_700_000_000;
        assert_eq!(TimeWindow::All.start_timestamp(now), None);
        assert_eq!(TimeWindow::Hours2.start_timestamp(now), Some(now - 7_200));
        assert_eq!(TimeWindow::Hours24.start_timestamp(now), Some(now - 86_400));
        assert_eq!(TimeWindow::Days30.start_timestamp(now), Some(now - 2_592_000));
    }

    #[test]
    fn test_parsing() {
        for key in ["all", "2h", "6h", "24h", "3d", "7d", "30d"] {
            assert_eq!(TimeWindow::from_key(key).map(|w| w.as_str()), Some(key));
        }
        assert_eq!(TimeWindow::from_key("1y"), None);
        assert_eq!(TimeWindow::parse_lenient("1y"), TimeWindow::All);
    }
}
