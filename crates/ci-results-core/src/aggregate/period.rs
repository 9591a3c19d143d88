use crate::errors::StatsError;

pub const DAY_MS: i64 = 86_400_000;

/// Half-open `[start, end)` range of build timestamps, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

impl Window {
    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// Parses a comma-separated list of non-negative day counts.
pub fn parse_periods(periods: &str) -> Result<Vec<u32>, StatsError> {
    if periods.trim().is_empty() {
        return Err(StatsError::InvalidPeriod {
            value: periods.to_string(),
            reason: "no periods given".into(),
        });
    }
    periods
        .split(',')
        .map(|p| {
            let p = p.trim();
            p.parse::<u32>().map_err(|_| StatsError::InvalidPeriod {
                value: p.to_string(),
                reason: if p.starts_with('-') && p[1..].parse::<u32>().is_ok() {
                    "day count must not be negative".into()
                } else {
                    "not a whole number of days".into()
                },
            })
        })
        .collect()
}

/// Lays windows back to back in request order, the first one ending at `now`.
pub fn layout_windows(now_ms: i64, days: &[u32]) -> Vec<Window> {
    let mut end = now_ms;
    days.iter()
        .map(|d| {
            let start = end.saturating_sub(i64::from(*d).saturating_mul(DAY_MS));
            let w = Window { start, end };
            end = start;
            w
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_counts() {
        assert_eq!(parse_periods("7,7").unwrap(), vec![7, 7]);
        assert_eq!(parse_periods(" 1, 0 ,30").unwrap(), vec![1, 0, 30]);
    }

    #[test]
    fn rejects_bad_day_counts() {
        for bad in ["", "7,", "x", "7,-1", "1.5", "7;7"] {
            assert!(
                matches!(parse_periods(bad), Err(StatsError::InvalidPeriod { .. })),
                "{bad:?} should be rejected"
            );
        }
        match parse_periods("-3") {
            Err(StatsError::InvalidPeriod { reason, .. }) => assert!(reason.contains("negative")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn windows_are_contiguous_from_now() {
        let now = 100 * DAY_MS;
        let w = layout_windows(now, &[7, 0, 3]);
        assert_eq!(
            w,
            vec![
                Window {
                    start: 93 * DAY_MS,
                    end: now
                },
                Window {
                    start: 93 * DAY_MS,
                    end: 93 * DAY_MS
                },
                Window {
                    start: 90 * DAY_MS,
                    end: 93 * DAY_MS
                },
            ]
        );
        assert!(w[0].contains(now - 1));
        assert!(!w[0].contains(now));
        assert!(!w[1].contains(93 * DAY_MS));
        assert!(w[2].contains(90 * DAY_MS));
    }
}
