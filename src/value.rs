use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::ParsedValue;

static MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s*([0-9]{1,3}(?:,?[0-9]{3})*(?:\.[0-9]+)?)").expect("money regex")
});

static PCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*%").expect("percent regex"));

pub(crate) static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    let months = "Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|Jun(?:e)?|Jul(?:y)?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?";
    Regex::new(&format!(
        r"(?i)(?:(?:{months})\s+\d{{1,2}},?\s+\d{{4}}|\d{{4}}-\d{{2}}-\d{{2}}|\d{{1,2}}/\d{{1,2}}/\d{{2,4}})"
    ))
    .expect("date regex")
});

static PURE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\s$]*([0-9]{1,3}(?:,?[0-9]{3})*(?:\.[0-9]+)?)[\s%$]*$").expect("number regex")
});

/// Decode a raw cell or snippet into typed values. Never fails; a string
/// with nothing recognizable comes back with all typed fields None and the
/// raw text preserved.
pub fn parse_value(raw: &str) -> ParsedValue {
    let mut value = ParsedValue {
        raw: raw.to_string(),
        ..ParsedValue::default()
    };

    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return value;
    }

    if let Some(caps) = MONEY_RE.captures(cleaned) {
        value.dollar = parse_numeric(&caps[1]);
    }
    if let Some(caps) = PCT_RE.captures(cleaned) {
        value.percent = parse_numeric(&caps[1]);
    }

    // A dollar figure restated as a percent of something else, e.g.
    // "$166.264 (70.00% of the initial share price)".
    if value.dollar.is_some() && value.percent.is_some() {
        value.compound_percent = value.percent;
    }

    if let Some(found) = DATE_RE.find(cleaned) {
        value.date = parse_date(found.as_str());
    }

    // Bare numbers next to financial labels are overwhelmingly dollar
    // figures in this document class.
    if value.dollar.is_none() && value.percent.is_none() && value.date.is_none() {
        if let Some(caps) = PURE_NUMBER_RE.captures(cleaned) {
            value.dollar = parse_numeric(&caps[1]);
        }
    }

    value
}

pub(crate) fn parse_numeric(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

/// Normalize a date snippet matched by `DATE_RE` to a `NaiveDate`.
pub(crate) fn parse_date(snippet: &str) -> Option<NaiveDate> {
    let cleaned = snippet.replace(',', "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    const FORMATS: &[&str] = &["%B %d %Y", "%b %d %Y", "%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_amount() {
        let value = parse_value("$237.52");
        assert_eq!(value.dollar, Some(237.52));
        assert_eq!(value.percent, None);
    }

    #[test]
    fn dollar_with_commas() {
        assert_eq!(parse_value("$1,000.00").dollar, Some(1000.0));
    }

    #[test]
    fn percentage() {
        let value = parse_value("70.00%");
        assert_eq!(value.percent, Some(70.0));
        assert_eq!(value.dollar, None);
    }

    #[test]
    fn compound_value() {
        let value = parse_value("$166.264 (70.00% of the initial share price)");
        assert_eq!(value.dollar, Some(166.264));
        assert_eq!(value.percent, Some(70.0));
        assert_eq!(value.compound_percent, Some(70.0));
    }

    #[test]
    fn month_name_date() {
        let value = parse_value("January 15, 2025");
        assert_eq!(value.date, NaiveDate::from_ymd_opt(2025, 1, 15));
    }

    #[test]
    fn iso_date() {
        let value = parse_value("2025-01-15");
        assert_eq!(value.date, NaiveDate::from_ymd_opt(2025, 1, 15));
    }

    #[test]
    fn slash_date() {
        let value = parse_value("1/15/2027");
        assert_eq!(value.date, NaiveDate::from_ymd_opt(2027, 1, 15));
    }

    #[test]
    fn empty_string_preserves_raw() {
        let value = parse_value("");
        assert_eq!(value.raw, "");
        assert_eq!(value.dollar, None);
        assert_eq!(value.percent, None);
        assert_eq!(value.date, None);
    }

    #[test]
    fn pure_number_treated_as_dollar() {
        assert_eq!(parse_value("1000").dollar, Some(1000.0));
    }

    #[test]
    fn percentage_per_annum() {
        assert_eq!(parse_value("9.40% per annum").percent, Some(9.4));
    }

    #[test]
    fn garbage_degrades_to_raw_only() {
        let value = parse_value("see accompanying prospectus");
        assert_eq!(value.raw, "see accompanying prospectus");
        assert_eq!(value.dollar, None);
        assert_eq!(value.percent, None);
        assert_eq!(value.compound_percent, None);
        assert_eq!(value.date, None);
    }
}
