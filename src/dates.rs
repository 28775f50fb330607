use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::value::{parse_date, DATE_RE};

/// Date labels worth mining from free text, paired with the key they land
/// under in the output map.
const DATE_KEYWORDS: &[(&str, &str)] = &[
    ("pricing date", "pricing_date"),
    ("trade date", "trade_date"),
    ("valuation date", "valuation_date"),
    ("initial valuation date", "initial_valuation_date"),
    ("final valuation date", "final_valuation_date"),
    ("maturity date", "maturity_date"),
    ("settlement date", "settlement_date"),
    ("issue date", "issue_date"),
    ("observation date", "observation_date"),
];

static KEYWORD_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    DATE_KEYWORDS
        .iter()
        .map(|(keyword, key)| {
            let pattern = format!(r"(?i){}[:\s,]*([^.]{{0,100}})", regex::escape(keyword));
            (*key, Regex::new(&pattern).expect("date keyword regex"))
        })
        .collect()
});

/// Scan free text for dates appearing within a short window after known
/// date labels. Only the first parseable occurrence per label is kept.
pub fn extract_dates(text: &str) -> BTreeMap<&'static str, NaiveDate> {
    let mut dates = BTreeMap::new();

    for (key, keyword_regex) in KEYWORD_RES.iter() {
        if dates.contains_key(key) {
            continue;
        }
        for caps in keyword_regex.captures_iter(text) {
            let context = &caps[1];
            let Some(found) = DATE_RE.find(context) else {
                continue;
            };
            if let Some(date) = parse_date(found.as_str()) {
                dates.insert(*key, date);
                break;
            }
        }
    }

    debug!(dates = dates.len(), "free-text date extraction complete");
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_labeled_dates() {
        let text = "Pricing Date: January 15, 2024\n\
                    Trade Date: January 18, 2024\n\
                    Maturity Date: January 15, 2027";
        let dates = extract_dates(text);
        assert_eq!(
            dates.get("pricing_date"),
            NaiveDate::from_ymd_opt(2024, 1, 15).as_ref()
        );
        assert_eq!(
            dates.get("trade_date"),
            NaiveDate::from_ymd_opt(2024, 1, 18).as_ref()
        );
        assert_eq!(
            dates.get("maturity_date"),
            NaiveDate::from_ymd_opt(2027, 1, 15).as_ref()
        );
    }

    #[test]
    fn slash_format() {
        let dates = extract_dates("Maturity Date: 01/15/2027");
        assert_eq!(
            dates.get("maturity_date"),
            NaiveDate::from_ymd_opt(2027, 1, 15).as_ref()
        );
    }

    #[test]
    fn first_occurrence_wins() {
        let text = "Pricing Date: March 1, 2024 ... Pricing Date: March 2, 2024";
        let dates = extract_dates(text);
        assert_eq!(
            dates.get("pricing_date"),
            NaiveDate::from_ymd_opt(2024, 3, 1).as_ref()
        );
    }

    #[test]
    fn no_dates_in_plain_prose() {
        assert!(extract_dates("no dates are mentioned anywhere in here").is_empty());
    }
}
