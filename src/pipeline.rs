use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::model::{CanonicalField, FieldMatch, ParsedFiling, ParsedValue, SourceTier};
use crate::{dates, generic, identifiers, issuers, labels, tables, terms, text, validate};

type TierFields = BTreeMap<CanonicalField, FieldMatch>;

/// Knobs for the merge/derivation stage. The per-period coupon derivation
/// assumes quarterly payments unless the caller knows the observation
/// schedule and overrides it.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub assumed_payments_per_year: f64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            assumed_payments_per_year: 4.0,
        }
    }
}

/// Parse one filing through the tiered extraction pipeline with default
/// options. `issuer` is an explicit issuer name; pass `None` to detect
/// the issuer from the document text.
pub fn parse_filing(content: &str, is_html: bool, issuer: Option<&str>) -> ParsedFiling {
    parse_filing_with(content, is_html, issuer, &ParseOptions::default())
}

/// Full pipeline: HTML tables (Tier 1), issuer regex (Tier 2), generic
/// regex (Tier 3), first-tier-wins merge, derived fields, defaults, and
/// cross-validation. Always returns a best-effort record; missing fields
/// stay unset rather than failing the document.
pub fn parse_filing_with(
    content: &str,
    is_html: bool,
    issuer_hint: Option<&str>,
    options: &ParseOptions,
) -> ParsedFiling {
    let plain_text = if is_html {
        text::extract_text_from_html(content)
    } else {
        content.to_string()
    };

    let issuer_config = issuer_hint
        .and_then(issuers::issuer_by_name)
        .or_else(|| issuers::detect_issuer(&plain_text));

    // Tier 1: table mining over the raw HTML.
    let tier1: TierFields = if is_html {
        let stop = issuer_config.is_some_and(|config| config.stop_after_first_valid_table);
        let pairs = tables::extract_label_value_pairs(content, stop);
        labels::match_labels(&pairs)
    } else {
        TierFields::new()
    };
    debug!(fields = tier1.len(), "tier 1 (tables) complete");

    let tier1_initial = dollar_of(&tier1, CanonicalField::InitialPrice);

    // Tier 2: two passes so the semantic autocall patterns can use an
    // initial price discovered in the first pass.
    let mut tier2 = TierFields::new();
    if let Some(config) = issuer_config {
        tier2 = issuers::extract_issuer_fields(&plain_text, config, None);
        let known_initial = tier1_initial.or_else(|| dollar_of(&tier2, CanonicalField::InitialPrice));
        if known_initial.is_some() {
            tier2 = issuers::extract_issuer_fields(&plain_text, config, known_initial);
        }
        debug!(issuer = config.name, fields = tier2.len(), "tier 2 (issuer regex) complete");
    }

    // Tier 3: generic fallbacks, fed the best initial price found so far.
    let mut tier3 = generic::extract_initial_and_threshold(&plain_text);
    let best_initial = tier1_initial
        .or_else(|| dollar_of(&tier2, CanonicalField::InitialPrice))
        .or_else(|| dollar_of(&tier3, CanonicalField::InitialPrice));
    if let Some(autocall) = generic::extract_autocall(&plain_text, best_initial) {
        tier3.insert(CanonicalField::AutocallLevel, autocall);
    }
    if let Some(rate) = generic::extract_coupon_rate(&plain_text) {
        tier3.insert(CanonicalField::CouponRatePct, rate);
    }
    if let Some(payment) = generic::extract_coupon_payment(&plain_text) {
        tier3.insert(CanonicalField::CouponPayment, payment);
    }
    if let Some(notional) = generic::extract_notional(&plain_text) {
        tier3.insert(CanonicalField::Notional, notional);
    }
    debug!(fields = tier3.len(), "tier 3 (generic regex) complete");

    // First-tier-wins merge across the ordered strategies.
    let tiers = [&tier1, &tier2, &tier3];
    let mut sources = BTreeMap::new();
    let mut filing = ParsedFiling {
        initial_price: pick(&tiers, CanonicalField::InitialPrice, dollar, &mut sources),
        threshold_dollar: pick(&tiers, CanonicalField::ThresholdDollar, dollar, &mut sources),
        autocall_level: pick(&tiers, CanonicalField::AutocallLevel, dollar, &mut sources),
        coupon_payment_per_period: pick(&tiers, CanonicalField::CouponPayment, dollar, &mut sources),
        coupon_rate_annual: pick(&tiers, CanonicalField::CouponRatePct, percent, &mut sources),
        notional: pick(&tiers, CanonicalField::Notional, dollar, &mut sources),
        ..ParsedFiling::default()
    };

    // threshold_pct: a table-supplied compound percent wins; otherwise
    // derive from the dollar threshold and the initial price.
    let table_threshold_pct = tier1
        .get(&CanonicalField::ThresholdDollar)
        .and_then(|m| m.value.compound_percent.or(m.value.percent))
        .or_else(|| {
            tier1
                .get(&CanonicalField::ThresholdPct)
                .and_then(|m| m.value.percent)
        });
    if let Some(pct) = table_threshold_pct {
        filing.threshold_pct = Some(pct);
        sources.insert(CanonicalField::ThresholdPct, SourceTier::Table);
    } else if let (Some(threshold), Some(initial)) = (filing.threshold_dollar, filing.initial_price)
    {
        if threshold > 0.0 && initial > 0.0 {
            filing.threshold_pct = Some(threshold / initial * 100.0);
            sources.insert(CanonicalField::ThresholdPct, SourceTier::Derived);
        }
    }

    // Per-period coupon percent, from the annual rate when available.
    if let Some(rate) = filing.coupon_rate_annual.filter(|rate| *rate > 0.0) {
        filing.contingent_payment_pct = Some(rate / options.assumed_payments_per_year);
        sources.insert(
            CanonicalField::ContingentPaymentPct,
            SourceTier::DerivedFromAnnualRate,
        );
    } else if let (Some(payment), Some(notional)) =
        (filing.coupon_payment_per_period, filing.notional)
    {
        if payment > 0.0 && notional > 0.0 {
            filing.contingent_payment_pct = Some(payment / notional * 100.0);
            sources.insert(
                CanonicalField::ContingentPaymentPct,
                SourceTier::DerivedFromPaymentAndNotional,
            );
        }
    }

    // Most autocallable notes call at the money when no level is stated.
    if filing.autocall_level.is_none() {
        if let Some(initial) = filing.initial_price {
            filing.autocall_level = Some(initial);
            sources.insert(CanonicalField::AutocallLevel, SourceTier::DefaultEqualsInitial);
        }
    }

    // Issuer, underlying, payment frequency: table text first, then the
    // hint or the name-pattern classifier.
    if let Some(raw) = raw_of(&tier1, CanonicalField::Issuer) {
        filing.issuer = Some(raw);
        sources.insert(CanonicalField::Issuer, SourceTier::Table);
    } else if let Some(name) = issuer_hint
        .map(str::to_string)
        .or_else(|| issuer_config.map(|config| config.name.to_string()))
    {
        filing.issuer = Some(name);
        sources.insert(CanonicalField::Issuer, SourceTier::IssuerRegex);
    }

    if let Some(raw) = raw_of(&tier1, CanonicalField::Underlying) {
        filing.underlying = Some(raw);
        sources.insert(CanonicalField::Underlying, SourceTier::Table);
    }
    if let Some(raw) = raw_of(&tier1, CanonicalField::PaymentFrequency) {
        filing.payment_frequency = Some(raw);
        sources.insert(CanonicalField::PaymentFrequency, SourceTier::Table);
    }

    // Identifiers: a table cell wins if its content carries a valid check
    // digit; otherwise fall back to the labeled free-text scan.
    let table_cusip = raw_of(&tier1, CanonicalField::Cusip)
        .map(|raw| raw.to_uppercase())
        .filter(|candidate| identifiers::validate_cusip(candidate));
    if let Some(cusip) = table_cusip {
        filing.cusip = Some(cusip);
        sources.insert(CanonicalField::Cusip, SourceTier::Table);
    } else if let Some(cusip) = identifiers::extract_cusip(&plain_text) {
        filing.cusip = Some(cusip);
        sources.insert(CanonicalField::Cusip, SourceTier::GenericRegex);
    }

    let table_isin = raw_of(&tier1, CanonicalField::Isin)
        .map(|raw| raw.to_uppercase())
        .filter(|candidate| identifiers::validate_isin(candidate));
    if let Some(isin) = table_isin {
        filing.isin = Some(isin);
        sources.insert(CanonicalField::Isin, SourceTier::Table);
    } else if let Some(isin) = identifiers::extract_isin(&plain_text) {
        filing.isin = Some(isin);
        sources.insert(CanonicalField::Isin, SourceTier::GenericRegex);
    }

    // Dates: table cells first, then the keyword-window free-text scan.
    let free_dates = dates::extract_dates(&plain_text);
    let mut all_dates = free_dates.clone();

    let date_slots = [
        (CanonicalField::PricingDate, "pricing_date"),
        (CanonicalField::MaturityDate, "maturity_date"),
        (CanonicalField::IssueDate, "issue_date"),
    ];
    for (field, key) in date_slots {
        let table_date = tier1.get(&field).and_then(|m| m.value.date);
        let (date, tier) = match (table_date, free_dates.get(key)) {
            (Some(date), _) => (date, SourceTier::Table),
            (None, Some(date)) => (*date, SourceTier::GenericRegex),
            (None, None) => continue,
        };
        match field {
            CanonicalField::PricingDate => filing.pricing_date = Some(date),
            CanonicalField::MaturityDate => filing.maturity_date = Some(date),
            _ => filing.issue_date = Some(date),
        }
        sources.insert(field, tier);
        all_dates.insert(key, date);
    }

    filing.sources = sources;

    // Supplemental terms, computed independently of the tiers.
    filing.product_terms = terms::extract_product_terms(&plain_text);

    filing.validation_warnings = validate::cross_validate(&filing);
    if !all_dates.is_empty() {
        filing.validation_warnings.extend(
            validate::validate_dates(&all_dates)
                .iter()
                .map(ToString::to_string),
        );
    }

    let populated = filing.sources.len();
    info!(
        fields = populated,
        warnings = filing.validation_warnings.len(),
        "filing parsed"
    );
    filing
}

fn dollar(value: &ParsedValue) -> Option<f64> {
    value.dollar
}

fn percent(value: &ParsedValue) -> Option<f64> {
    value.percent
}

fn dollar_of(tier: &TierFields, field: CanonicalField) -> Option<f64> {
    tier.get(&field).and_then(|m| m.value.dollar)
}

fn raw_of(tier: &TierFields, field: CanonicalField) -> Option<String> {
    tier.get(&field)
        .map(|m| m.value.raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

/// Select the value for one field from the highest-priority tier whose
/// match carries the needed typed value, recording the winning tier.
fn pick(
    tiers: &[&TierFields],
    field: CanonicalField,
    get: fn(&ParsedValue) -> Option<f64>,
    sources: &mut BTreeMap<CanonicalField, SourceTier>,
) -> Option<f64> {
    for tier in tiers {
        if let Some(field_match) = tier.get(&field) {
            if let Some(value) = get(&field_match.value) {
                sources.insert(field, field_match.source);
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A_HTML: &str = r#"
<html><body>
<table>
  <tr><td>Initial share price</td><td>$237.52</td></tr>
  <tr><td>Downside threshold level</td><td>$166.264 (70.00% of the initial share price)</td></tr>
</table>
</body></html>
"#;

    #[test]
    fn scenario_a_table_extraction() {
        let filing = parse_filing(SCENARIO_A_HTML, true, None);
        assert_eq!(filing.initial_price, Some(237.52));
        assert_eq!(filing.threshold_dollar, Some(166.264));
        assert_eq!(filing.threshold_pct, Some(70.0));
        assert_eq!(
            filing.sources[&CanonicalField::InitialPrice],
            SourceTier::Table
        );
        assert_eq!(
            filing.sources[&CanonicalField::ThresholdDollar],
            SourceTier::Table
        );
        assert_eq!(
            filing.sources[&CanonicalField::ThresholdPct],
            SourceTier::Table
        );
    }

    #[test]
    fn scenario_b_plain_text_fallback() {
        let text = "The Initial Value, which is $198.35, was determined on the pricing date. \
                    Payments depend on the Interest Barrier of $138.845.";
        let filing = parse_filing(text, false, None);
        assert_eq!(filing.initial_price, Some(198.35));
        assert_eq!(filing.threshold_dollar, Some(138.845));
        assert_eq!(
            filing.sources[&CanonicalField::InitialPrice],
            SourceTier::GenericRegex
        );
        assert_eq!(
            filing.sources[&CanonicalField::ThresholdDollar],
            SourceTier::GenericRegex
        );
    }

    #[test]
    fn scenario_c_autocall_equals_initial() {
        let text = "The Initial Value, which is $150.00, was determined on the pricing date. \
                    The notes will be automatically called if the closing value is sufficient.";
        let filing = parse_filing(text, false, None);
        assert_eq!(filing.autocall_level, Some(150.0));
        assert_eq!(
            filing.sources[&CanonicalField::AutocallLevel],
            SourceTier::GenericRegex
        );
    }

    #[test]
    fn scenario_d_contingent_payment_from_annual_rate() {
        let text = "The notes pay a contingent coupon of 9.40% per annum.";
        let filing = parse_filing(text, false, None);
        assert_eq!(filing.coupon_rate_annual, Some(9.4));
        assert_eq!(filing.contingent_payment_pct, Some(2.35));
        assert_eq!(
            filing.sources[&CanonicalField::ContingentPaymentPct],
            SourceTier::DerivedFromAnnualRate
        );
    }

    #[test]
    fn payments_per_year_is_overridable() {
        let text = "The notes pay a contingent coupon of 12.00% per annum.";
        let options = ParseOptions {
            assumed_payments_per_year: 12.0,
        };
        let filing = parse_filing_with(text, false, None, &options);
        assert_eq!(filing.contingent_payment_pct, Some(1.0));
    }

    #[test]
    fn tier_precedence_table_beats_generic() {
        // The flattened table text also matches the generic patterns; the
        // table tier must still win.
        let filing = parse_filing(SCENARIO_A_HTML, true, None);
        assert_eq!(
            filing.sources[&CanonicalField::InitialPrice],
            SourceTier::Table
        );
        assert_eq!(filing.initial_price, Some(237.52));
    }

    #[test]
    fn derived_threshold_pct() {
        let html = r#"
<table>
  <tr><td>Initial share price</td><td>$200.00</td></tr>
  <tr><td>Downside threshold level</td><td>$140.00</td></tr>
</table>
"#;
        let filing = parse_filing(html, true, None);
        let pct = filing.threshold_pct.unwrap();
        assert!((pct - 70.0).abs() < 0.01);
        assert_eq!(
            filing.sources[&CanonicalField::ThresholdPct],
            SourceTier::Derived
        );
    }

    #[test]
    fn autocall_defaults_to_initial() {
        let html = r#"
<table>
  <tr><td>Initial share price</td><td>$100.00</td></tr>
</table>
"#;
        let filing = parse_filing(html, true, None);
        assert_eq!(filing.autocall_level, Some(100.0));
        assert_eq!(
            filing.sources[&CanonicalField::AutocallLevel],
            SourceTier::DefaultEqualsInitial
        );
    }

    #[test]
    fn every_populated_field_names_its_source() {
        let filing = parse_filing(SCENARIO_A_HTML, true, None);
        assert!(filing.initial_price.is_some());
        for field in [
            CanonicalField::InitialPrice,
            CanonicalField::ThresholdDollar,
            CanonicalField::ThresholdPct,
            CanonicalField::AutocallLevel,
        ] {
            assert!(filing.sources.contains_key(&field), "missing source for {field:?}");
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let first = parse_filing(SCENARIO_A_HTML, true, None);
        let second = parse_filing(SCENARIO_A_HTML, true, None);
        assert_eq!(first, second);
    }

    #[test]
    fn issuer_hint_enables_tier_two() {
        let text = "Initial share price: $237.52. Contingent quarterly coupon of $0.5375. \
                    The notes are called when the price closes greater than or equal to \
                    the initial share price on any determination date.";
        let filing = parse_filing(text, false, Some("Goldman Sachs"));
        assert_eq!(filing.issuer.as_deref(), Some("Goldman Sachs"));
        assert_eq!(filing.initial_price, Some(237.52));
        assert_eq!(
            filing.sources[&CanonicalField::InitialPrice],
            SourceTier::IssuerRegex
        );
        assert_eq!(filing.autocall_level, Some(237.52));
        assert_eq!(filing.coupon_payment_per_period, Some(0.5375));
    }

    #[test]
    fn issuer_detected_from_text() {
        let text = "Securities issued by GS Finance Corp, guaranteed by The Goldman Sachs Group. \
                    Initial share price: $87.00";
        let filing = parse_filing(text, false, None);
        assert_eq!(filing.issuer.as_deref(), Some("Goldman Sachs"));
        assert_eq!(
            filing.sources[&CanonicalField::Issuer],
            SourceTier::IssuerRegex
        );
    }

    #[test]
    fn table_dates_validated_and_sourced() {
        let html = r#"
<table>
  <tr><td>Pricing date</td><td>January 15, 2024</td></tr>
  <tr><td>Maturity date</td><td>January 15, 2027</td></tr>
</table>
"#;
        let filing = parse_filing(html, true, None);
        assert_eq!(
            filing.pricing_date,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(
            filing.maturity_date,
            chrono::NaiveDate::from_ymd_opt(2027, 1, 15)
        );
        assert_eq!(
            filing.sources[&CanonicalField::PricingDate],
            SourceTier::Table
        );
        assert!(filing.validation_warnings.is_empty());
    }

    #[test]
    fn inverted_dates_produce_warning_not_failure() {
        let html = r#"
<table>
  <tr><td>Pricing date</td><td>January 15, 2024</td></tr>
  <tr><td>Maturity date</td><td>January 15, 2020</td></tr>
</table>
"#;
        let filing = parse_filing(html, true, None);
        assert!(
            filing
                .validation_warnings
                .iter()
                .any(|warning| warning.contains("Maturity date"))
        );
    }

    #[test]
    fn cusip_flows_into_filing() {
        let text = "CUSIP: 037833100. The Initial Value, which is $10.00.";
        let filing = parse_filing(text, false, None);
        assert_eq!(filing.cusip.as_deref(), Some("037833100"));
        assert_eq!(
            filing.sources[&CanonicalField::Cusip],
            SourceTier::GenericRegex
        );
    }

    #[test]
    fn unparseable_html_degrades_to_empty_record() {
        let filing = parse_filing("<<<<not really html>>>>", true, None);
        assert_eq!(filing.initial_price, None);
        assert!(filing.sources.is_empty());
    }

    #[test]
    fn product_terms_merged_alongside() {
        let text = "Autocallable notes with a coupon rate of 9.4% paid quarterly, \
                    subject to quarterly observation.";
        let filing = parse_filing(text, false, None);
        assert!(filing.product_terms.is_autocallable);
        assert_eq!(
            filing.product_terms.payoff_type,
            crate::terms::PayoffType::AutocallableCoupon
        );
    }
}
