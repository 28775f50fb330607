use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::model::ParsedFiling;

/// Typical downside threshold band; values outside it are suspicious but
/// not fatal.
const THRESHOLD_PCT_MIN: f64 = 50.0;
const THRESHOLD_PCT_MAX: f64 = 100.0;
/// Annual coupon rates above this are almost always misparses.
const MAX_PLAUSIBLE_COUPON_PCT: f64 = 50.0;
const MIN_TERM_DAYS: i64 = 30;
const MAX_TERM_YEARS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// An advisory finding about date chronology. Never blocks output.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub severity: Severity,
    pub field: Option<&'static str>,
    pub message: String,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "[{}] [{}] {}", self.severity, field, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

fn finding(severity: Severity, field: Option<&'static str>, message: String) -> ValidationWarning {
    ValidationWarning {
        severity,
        field,
        message,
    }
}

/// Check the merged record for internally inconsistent values. Pure; each
/// finding is one advisory string.
pub fn cross_validate(filing: &ParsedFiling) -> Vec<String> {
    let mut warnings = Vec::new();

    if let (Some(autocall), Some(threshold)) = (filing.autocall_level, filing.threshold_dollar) {
        if autocall < threshold {
            warnings.push(format!(
                "Autocall level (${autocall:.2}) is below threshold (${threshold:.2}), which is unusual"
            ));
        }
    }

    if let Some(pct) = filing.threshold_pct {
        if !(THRESHOLD_PCT_MIN..=THRESHOLD_PCT_MAX).contains(&pct) {
            warnings.push(format!(
                "Threshold percentage ({pct:.2}%) is outside typical {THRESHOLD_PCT_MIN:.0}-{THRESHOLD_PCT_MAX:.0}% range"
            ));
        }
    }

    if let Some(initial) = filing.initial_price {
        if initial <= 0.0 {
            warnings.push(format!("Initial price (${initial}) is not positive"));
        }
    }

    if let Some(rate) = filing.coupon_rate_annual {
        if rate > MAX_PLAUSIBLE_COUPON_PCT {
            warnings.push(format!(
                "Annual coupon rate ({rate}%) seems unusually high"
            ));
        }
    }

    warnings
}

/// Chronology and term-length checks over whichever dates were found.
/// Everything here is relative to the document's own dates, never the
/// wall clock, so output stays deterministic.
pub fn validate_dates(dates: &BTreeMap<&'static str, NaiveDate>) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if dates.is_empty() {
        warnings.push(finding(
            Severity::Warning,
            None,
            "No dates extracted from filing".to_string(),
        ));
        return warnings;
    }

    if let (Some(pricing), Some(maturity)) = (dates.get("pricing_date"), dates.get("maturity_date"))
    {
        if maturity <= pricing {
            warnings.push(finding(
                Severity::Error,
                Some("maturity_date"),
                format!("Maturity date ({maturity}) must be after pricing date ({pricing})"),
            ));
        } else {
            let days = (*maturity - *pricing).num_days();
            let years = days as f64 / 365.25;
            if days < MIN_TERM_DAYS {
                warnings.push(finding(
                    Severity::Warning,
                    Some("maturity_date"),
                    format!(
                        "Very short maturity: {days} days ({years:.2} years). Verify this is not an error."
                    ),
                ));
            } else if years > MAX_TERM_YEARS {
                warnings.push(finding(
                    Severity::Warning,
                    Some("maturity_date"),
                    format!("Very long maturity: {years:.1} years. Verify this is not an error."),
                ));
            }
        }
    }

    if let (Some(trade), Some(settlement)) = (dates.get("trade_date"), dates.get("settlement_date"))
    {
        if settlement < trade {
            warnings.push(finding(
                Severity::Error,
                Some("settlement_date"),
                format!("Settlement date ({settlement}) cannot be before trade date ({trade})"),
            ));
        }
    }

    if let (Some(pricing), Some(trade)) = (dates.get("pricing_date"), dates.get("trade_date")) {
        let days = (*trade - *pricing).num_days();
        if days < 0 {
            warnings.push(finding(
                Severity::Error,
                Some("trade_date"),
                format!("Trade date ({trade}) cannot be before pricing date ({pricing})"),
            ));
        } else if days > 5 {
            warnings.push(finding(
                Severity::Warning,
                Some("trade_date"),
                format!(
                    "Trade date is {days} days after pricing date. This is unusual (typically T+0 or T+1)"
                ),
            ));
        }
    }

    if let (Some(issue), Some(settlement)) = (dates.get("issue_date"), dates.get("settlement_date"))
    {
        let days = (*issue - *settlement).num_days().abs();
        if days > 2 {
            warnings.push(finding(
                Severity::Warning,
                Some("issue_date"),
                format!(
                    "Issue date and settlement date differ by {days} days. They are typically the same or 1-2 days apart"
                ),
            ));
        }
    }

    if let (Some(initial_valuation), Some(final_valuation)) = (
        dates.get("initial_valuation_date"),
        dates.get("final_valuation_date"),
    ) {
        if final_valuation <= initial_valuation {
            warnings.push(finding(
                Severity::Error,
                Some("final_valuation_date"),
                format!(
                    "Final valuation date ({final_valuation}) must be after initial valuation date ({initial_valuation})"
                ),
            ));
        }
    }

    if let (Some(pricing), Some(valuation)) = (
        dates.get("pricing_date"),
        dates.get("initial_valuation_date"),
    ) {
        let days = (*valuation - *pricing).num_days().abs();
        if days > 3 {
            warnings.push(finding(
                Severity::Warning,
                Some("initial_valuation_date"),
                format!(
                    "Initial valuation date differs from pricing date by {days} days. They are typically the same"
                ),
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn autocall_below_threshold_warns_once() {
        let filing = ParsedFiling {
            autocall_level: Some(100.0),
            threshold_dollar: Some(120.0),
            ..ParsedFiling::default()
        };
        let warnings = cross_validate(&filing);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("100.00"));
        assert!(warnings[0].contains("120.00"));
    }

    #[test]
    fn threshold_pct_outside_band() {
        let filing = ParsedFiling {
            threshold_pct: Some(30.0),
            ..ParsedFiling::default()
        };
        assert_eq!(cross_validate(&filing).len(), 1);

        let filing = ParsedFiling {
            threshold_pct: Some(70.0),
            ..ParsedFiling::default()
        };
        assert!(cross_validate(&filing).is_empty());
    }

    #[test]
    fn nonpositive_initial_price() {
        let filing = ParsedFiling {
            initial_price: Some(0.0),
            ..ParsedFiling::default()
        };
        assert_eq!(cross_validate(&filing).len(), 1);
    }

    #[test]
    fn implausible_coupon_rate() {
        let filing = ParsedFiling {
            coupon_rate_annual: Some(75.0),
            ..ParsedFiling::default()
        };
        assert_eq!(cross_validate(&filing).len(), 1);

        let filing = ParsedFiling {
            coupon_rate_annual: Some(9.4),
            ..ParsedFiling::default()
        };
        assert!(cross_validate(&filing).is_empty());
    }

    #[test]
    fn consistent_filing_has_no_warnings() {
        let filing = ParsedFiling {
            initial_price: Some(237.52),
            threshold_dollar: Some(166.264),
            threshold_pct: Some(70.0),
            autocall_level: Some(237.52),
            coupon_rate_annual: Some(9.4),
            ..ParsedFiling::default()
        };
        assert!(cross_validate(&filing).is_empty());
    }

    #[test]
    fn maturity_before_pricing_is_an_error() {
        let mut dates = BTreeMap::new();
        dates.insert("pricing_date", date(2024, 1, 15));
        dates.insert("maturity_date", date(2020, 1, 15));
        let warnings = validate_dates(&dates);
        assert!(
            warnings
                .iter()
                .any(|w| w.severity == Severity::Error && w.field == Some("maturity_date"))
        );
    }

    #[test]
    fn ordinary_three_year_term_passes() {
        let mut dates = BTreeMap::new();
        dates.insert("pricing_date", date(2024, 1, 15));
        dates.insert("maturity_date", date(2027, 1, 15));
        assert!(validate_dates(&dates).is_empty());
    }

    #[test]
    fn very_short_term_warns() {
        let mut dates = BTreeMap::new();
        dates.insert("pricing_date", date(2024, 1, 15));
        dates.insert("maturity_date", date(2024, 1, 20));
        let warnings = validate_dates(&dates);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
    }

    #[test]
    fn settlement_before_trade_is_an_error() {
        let mut dates = BTreeMap::new();
        dates.insert("trade_date", date(2024, 1, 18));
        dates.insert("settlement_date", date(2024, 1, 10));
        let warnings = validate_dates(&dates);
        assert!(warnings.iter().any(|w| w.severity == Severity::Error));
    }

    #[test]
    fn empty_date_map_warns() {
        let warnings = validate_dates(&BTreeMap::new());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
    }

    #[test]
    fn warning_display_includes_severity_and_field() {
        let warning = finding(
            Severity::Error,
            Some("maturity_date"),
            "must be after pricing date".to_string(),
        );
        assert_eq!(
            warning.to_string(),
            "[ERROR] [maturity_date] must be after pricing date"
        );
    }
}
