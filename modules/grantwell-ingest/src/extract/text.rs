//! Free-text parsing helpers shared by the generic adapters.

use chrono::NaiveDate;
use grantwell_common::types::{DeadlineInfo, DeadlineType};
use regex::Regex;
use std::sync::OnceLock;

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("valid regex"))
}

/// Parse dollar amounts out of free text. One amount is an upper bound when
/// preceded by "up to", otherwise a point amount (min = max). Two amounts are
/// a range, lower bound first.
pub fn parse_funding_text(text: &str) -> (Option<f64>, Option<f64>) {
    let mut amounts: Vec<f64> = amount_re()
        .captures_iter(text)
        .filter_map(|c| c[1].replace(',', "").parse::<f64>().ok())
        .collect();

    match amounts.len() {
        0 => (None, None),
        1 => {
            let amount = amounts[0];
            if text.to_lowercase().contains("up to") {
                (None, Some(amount))
            } else {
                (Some(amount), Some(amount))
            }
        }
        _ => {
            amounts.sort_by(|a, b| a.total_cmp(b));
            (Some(amounts[0]), Some(amounts[amounts.len() - 1]))
        }
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
];

/// Parse a date from one of the formats grant sources actually publish.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Parse deadline text into a typed deadline. Rolling markers win over any
/// date mentioned alongside them.
pub fn parse_deadline_text(text: &str) -> DeadlineInfo {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DeadlineInfo::default();
    }

    let lower = trimmed.to_lowercase();
    let rolling_markers = ["rolling", "ongoing", "continuous", "open until filled", "no deadline"];
    if rolling_markers.iter().any(|m| lower.contains(m)) {
        return DeadlineInfo {
            deadline_type: DeadlineType::Rolling,
            date: None,
            text: Some(trimmed.to_string()),
        };
    }

    // Try the whole string, then a "Deadline: <date>" style suffix.
    let date = parse_date(trimmed).or_else(|| {
        trimmed
            .rsplit(':')
            .next()
            .and_then(|tail| parse_date(tail))
    });

    match date {
        Some(d) => DeadlineInfo {
            deadline_type: DeadlineType::Fixed,
            date: Some(d),
            text: Some(trimmed.to_string()),
        },
        None => DeadlineInfo {
            deadline_type: DeadlineType::Unknown,
            date: None,
            text: Some(trimmed.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_parses_to_min_and_max() {
        assert_eq!(
            parse_funding_text("Awards range from $5,000 to $50,000."),
            (Some(5_000.0), Some(50_000.0))
        );
    }

    #[test]
    fn up_to_parses_as_max_only() {
        assert_eq!(
            parse_funding_text("Grants of up to $250,000 are available."),
            (None, Some(250_000.0))
        );
    }

    #[test]
    fn single_amount_is_point_range() {
        assert_eq!(
            parse_funding_text("A one-time award of $10,000."),
            (Some(10_000.0), Some(10_000.0))
        );
    }

    #[test]
    fn no_amounts_is_none() {
        assert_eq!(parse_funding_text("Funding varies."), (None, None));
    }

    #[test]
    fn common_date_formats_parse() {
        assert_eq!(parse_date("2026-10-01"), Some(date(2026, 10, 1)));
        assert_eq!(parse_date("10/01/2026"), Some(date(2026, 10, 1)));
        assert_eq!(parse_date("October 1, 2026"), Some(date(2026, 10, 1)));
        assert_eq!(parse_date("Oct 1, 2026"), Some(date(2026, 10, 1)));
        assert_eq!(parse_date("next month"), None);
    }

    #[test]
    fn rolling_markers_win_over_dates() {
        let d = parse_deadline_text("Rolling, reviewed quarterly starting 01/15/2026");
        assert_eq!(d.deadline_type, DeadlineType::Rolling);
        assert!(d.date.is_none());
    }

    #[test]
    fn deadline_prefix_is_tolerated() {
        let d = parse_deadline_text("Deadline: October 1, 2026");
        assert_eq!(d.deadline_type, DeadlineType::Fixed);
        assert_eq!(d.date, Some(date(2026, 10, 1)));
    }

    #[test]
    fn unparseable_text_is_unknown_with_text_kept() {
        let d = parse_deadline_text("see program page");
        assert_eq!(d.deadline_type, DeadlineType::Unknown);
        assert_eq!(d.text.as_deref(), Some("see program page"));
    }
}
