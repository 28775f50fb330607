use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{CanonicalField, FieldMatch, ParsedValue, SourceTier};
use crate::value::parse_numeric;

/// Autocall patterns come in two kinds: ones that capture a dollar figure,
/// and semantic ones ("greater than or equal to the initial price") that
/// resolve to the already-discovered initial price and fire only when it
/// is known.
#[derive(Debug)]
pub enum AutocallPattern {
    Capture(Regex),
    EqualsInitial(Regex),
}

/// Coupon patterns either capture a per-period dollar payment or an annual
/// percentage rate.
#[derive(Debug)]
pub enum CouponPattern {
    Payment(Regex),
    RatePct(Regex),
}

/// Per-issuer extraction vocabulary. Issuers without Tier-2 patterns are
/// detect-only; extraction over them yields nothing.
#[derive(Debug)]
pub struct IssuerConfig {
    pub name: &'static str,
    detect: Vec<Regex>,
    initial: Vec<Regex>,
    threshold: Vec<Regex>,
    autocall: Vec<AutocallPattern>,
    coupon: Vec<CouponPattern>,
    notional: Vec<Regex>,
    /// Stop the Tier-1 table scan after the first table that yields a
    /// plausible set of pairs; these issuers front-load the authoritative
    /// terms table.
    pub stop_after_first_valid_table: bool,
}

// `Regex` is not `PartialEq`, so this cannot be derived. Issuers are uniquely
// identified by `name` (see `issuer_by_name`), so equality on the name is the
// natural identity and is all the tests compare against.
impl PartialEq for IssuerConfig {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("issuer pattern"))
        .collect()
}

fn capture(pattern: &str) -> AutocallPattern {
    AutocallPattern::Capture(Regex::new(&format!("(?i){pattern}")).expect("autocall pattern"))
}

fn equals_initial(pattern: &str) -> AutocallPattern {
    AutocallPattern::EqualsInitial(Regex::new(&format!("(?i){pattern}")).expect("autocall pattern"))
}

fn payment(pattern: &str) -> CouponPattern {
    CouponPattern::Payment(Regex::new(&format!("(?i){pattern}")).expect("coupon pattern"))
}

fn rate_pct(pattern: &str) -> CouponPattern {
    CouponPattern::RatePct(Regex::new(&format!("(?i){pattern}")).expect("coupon pattern"))
}

static ISSUERS: Lazy<Vec<IssuerConfig>> = Lazy::new(|| {
    vec![
        IssuerConfig {
            name: "Goldman Sachs",
            detect: compile(&[r"GS\s+Finance\s+Corp", r"Goldman\s+Sachs\s+&\s+Co"]),
            initial: compile(&[r"Initial\s+share\s+price[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)"]),
            threshold: compile(&[
                r"Downside\s+threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            autocall: vec![equals_initial(
                r"greater\s+than\s+or\s+equal\s+to\s+the\s+initial\s+(?:share\s+)?price",
            )],
            coupon: vec![payment(
                r"Contingent\s+(?:quarterly|monthly|semi-annual|annual)\s+coupon[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            )],
            notional: compile(&[
                r"per\s+\$\s*([0-9,]+(?:\.[0-9]+)?)\s+(?:stated\s+)?principal\s+amount",
                r"(?:stated\s+)?principal\s+amount\s+of\s+\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            stop_after_first_valid_table: true,
        },
        IssuerConfig {
            name: "JP Morgan",
            detect: compile(&[r"JPMorgan\s+Chase\s+Financial", r"J\.?P\.?\s*Morgan"]),
            initial: compile(&[r"Initial\s+Value[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)"]),
            threshold: compile(&[
                r"(?:Interest\s+Barrier|Trigger\s+Value)[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            autocall: vec![equals_initial(r"automatic(?:ally)?\s+call(?:ed)?")],
            coupon: vec![payment(
                r"Contingent\s+Interest\s+Payment[^$]{0,200}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            )],
            notional: compile(&[
                r"per\s+\$\s*([0-9,]+(?:\.[0-9]+)?)\s+(?:stated\s+)?principal\s+amount",
                r"(?:stated\s+)?principal\s+amount\s+of\s+\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"each\s+security\s+has\s+a\s+(?:stated\s+)?principal\s+amount\s+of\s+\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            stop_after_first_valid_table: true,
        },
        IssuerConfig {
            name: "UBS",
            detect: compile(&[r"UBS\s+AG", r"UBS\s+Financial"]),
            initial: compile(&[r"Initial\s+price[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)"]),
            threshold: compile(&[
                r"Trigger\s+price[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Coupon\s+barrier[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Downside\s+threshold\s+level[:\s]+\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Downside\s+threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            autocall: vec![
                equals_initial(r"equal\s+to\s+or\s+greater\s+than\s+the\s+initial\s+price"),
                capture(r"Call\s+threshold\s+level[:\s]+\$\s*([0-9,]+(?:\.[0-9]+)?)"),
                capture(r"Call\s+threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)"),
            ],
            coupon: vec![
                rate_pct(
                    r"Contingent\s+Coupon\s+Rate[^0-9]{0,50}([0-9]+(?:\.[0-9]+)?)\s*%\s*per\s+annum",
                ),
                payment(r"Contingent\s+Interest\s+Payment[^$]{0,200}\$\s*([0-9,]+(?:\.[0-9]+)?)"),
            ],
            notional: compile(&[
                r"\$\s*([0-9,]+(?:\.[0-9]+)?)\s+per\s+security",
                r"Principal\s+Amount[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)\s+per\s+security",
                r"per\s+\$\s*([0-9,]+(?:\.[0-9]+)?)\s+(?:stated\s+)?principal\s+amount",
                r"(?:stated\s+)?principal\s+amount\s+of\s+\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            stop_after_first_valid_table: true,
        },
        IssuerConfig {
            name: "Morgan Stanley",
            detect: compile(&[r"Morgan\s+Stanley\s+Finance", r"Morgan\s+Stanley\s+&\s+Co"]),
            initial: compile(&[
                r"Initial\s+(?:share\s+)?price[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Initial\s+Value[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            threshold: compile(&[
                r"Downside\s+threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            autocall: vec![
                capture(r"Call\s+threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)"),
                capture(r"Redemption\s+threshold[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)"),
            ],
            coupon: vec![
                payment(r"Contingent\s+Interest\s+Payment[^$]{0,200}\$\s*([0-9,]+(?:\.[0-9]+)?)"),
                payment(
                    r"Contingent\s+(?:quarterly|monthly|semi-annual|annual)\s+coupon[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                ),
            ],
            notional: compile(&[
                r"per\s+\$\s*([0-9,]+(?:\.[0-9]+)?)\s+(?:stated\s+)?principal\s+amount",
                r"(?:stated\s+)?principal\s+amount\s+of\s+\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            stop_after_first_valid_table: true,
        },
        IssuerConfig {
            name: "Credit Suisse",
            detect: compile(&[r"Credit\s+Suisse", r"CS\s+Finance"]),
            initial: Vec::new(),
            threshold: Vec::new(),
            autocall: Vec::new(),
            coupon: Vec::new(),
            notional: Vec::new(),
            stop_after_first_valid_table: false,
        },
        IssuerConfig {
            name: "HSBC",
            detect: compile(&[r"HSBC\s+USA", r"HSBC\s+Bank"]),
            initial: Vec::new(),
            threshold: Vec::new(),
            autocall: Vec::new(),
            coupon: Vec::new(),
            notional: Vec::new(),
            stop_after_first_valid_table: false,
        },
        IssuerConfig {
            name: "Citigroup",
            detect: compile(&[r"Citigroup\s+Global\s+Markets", r"Citibank"]),
            initial: Vec::new(),
            threshold: Vec::new(),
            autocall: Vec::new(),
            coupon: Vec::new(),
            notional: Vec::new(),
            stop_after_first_valid_table: false,
        },
        IssuerConfig {
            name: "Barclays",
            detect: compile(&[r"Barclays\s+Bank", r"Barclays\s+Capital"]),
            initial: compile(&[
                r"Initial\s+underlier\s+value[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Initial\s+(?:share\s+)?price[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Initial\s+Value[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            threshold: compile(&[
                r"Downside\s+threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Knock[- ]?in\s+(?:barrier\s+)?level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            autocall: vec![
                equals_initial(
                    r"greater\s+than\s+or\s+equal\s+to\s+the\s+initial\s+(?:share\s+)?(?:price|value|underlier\s+value|level)",
                ),
                equals_initial(
                    r"at\s+or\s+above\s+the\s+initial\s+(?:share\s+)?(?:price|value|underlier\s+value|level)",
                ),
                equals_initial(r"automatic(?:ally)?\s+call(?:ed)?"),
            ],
            coupon: vec![
                payment(
                    r"Contingent\s+(?:quarterly|monthly|semi-annual|annual)\s+(?:coupon|payment)[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                ),
                payment(r"Contingent\s+Interest\s+Payment[^$]{0,200}\$\s*([0-9,]+(?:\.[0-9]+)?)"),
            ],
            notional: compile(&[
                r"per\s+\$\s*([0-9,]+(?:\.[0-9]+)?)\s+(?:stated\s+)?principal\s+amount",
                r"(?:stated\s+)?principal\s+amount\s+of\s+\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            stop_after_first_valid_table: false,
        },
        IssuerConfig {
            name: "Bank of America",
            detect: compile(&[
                r"Bank\s+of\s+America",
                r"BofA\s+Finance",
                r"Merrill\s+Lynch",
            ]),
            initial: compile(&[
                r"Initial\s+(?:share\s+)?price[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Initial\s+Value[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            threshold: compile(&[
                r"Downside\s+threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                r"Threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            autocall: vec![
                capture(r"Call\s+threshold\s+level[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)"),
                equals_initial(r"automatic(?:ally)?\s+call(?:ed)?"),
            ],
            coupon: vec![
                payment(r"Contingent\s+Interest\s+Payment[^$]{0,200}\$\s*([0-9,]+(?:\.[0-9]+)?)"),
                payment(
                    r"Contingent\s+(?:quarterly|monthly|semi-annual|annual)\s+coupon[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
                ),
            ],
            notional: compile(&[
                r"per\s+\$\s*([0-9,]+(?:\.[0-9]+)?)\s+(?:stated\s+)?principal\s+amount",
                r"(?:stated\s+)?principal\s+amount\s+of\s+\$\s*([0-9,]+(?:\.[0-9]+)?)",
            ]),
            stop_after_first_valid_table: true,
        },
        IssuerConfig {
            name: "Royal Bank of Canada",
            detect: compile(&[r"Royal\s+Bank\s+of\s+Canada", r"RBC\s+Capital"]),
            initial: Vec::new(),
            threshold: Vec::new(),
            autocall: Vec::new(),
            coupon: Vec::new(),
            notional: Vec::new(),
            stop_after_first_valid_table: false,
        },
        IssuerConfig {
            name: "Bank of Montreal",
            detect: compile(&[r"Bank\s+of\s+Montreal", r"BMO\s+Capital"]),
            initial: Vec::new(),
            threshold: Vec::new(),
            autocall: Vec::new(),
            coupon: Vec::new(),
            notional: Vec::new(),
            stop_after_first_valid_table: false,
        },
        IssuerConfig {
            name: "CIBC",
            detect: compile(&[r"CIBC\s+World\s+Markets", r"Canadian\s+Imperial\s+Bank"]),
            initial: Vec::new(),
            threshold: Vec::new(),
            autocall: Vec::new(),
            coupon: Vec::new(),
            notional: Vec::new(),
            stop_after_first_valid_table: false,
        },
    ]
});

/// Identify the issuing bank from filing text via its known name strings.
pub fn detect_issuer(text: &str) -> Option<&'static IssuerConfig> {
    ISSUERS
        .iter()
        .find(|config| config.detect.iter().any(|pattern| pattern.is_match(text)))
}

pub fn issuer_by_name(name: &str) -> Option<&'static IssuerConfig> {
    ISSUERS
        .iter()
        .find(|config| config.name.eq_ignore_ascii_case(name))
}

fn regex_match(
    field: CanonicalField,
    value: ParsedValue,
    pattern_index: usize,
    label: &str,
) -> FieldMatch {
    FieldMatch {
        field,
        value,
        confidence: (1.0 - 0.1 * pattern_index as f64).max(0.5),
        source: SourceTier::IssuerRegex,
        label: label.to_string(),
    }
}

fn first_dollar_capture(
    patterns: &[Regex],
    text: &str,
) -> Option<(f64, usize, String)> {
    for (index, pattern) in patterns.iter().enumerate() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(value) = parse_numeric(&caps[1]) {
                return Some((value, index, caps[0].to_string()));
            }
        }
    }
    None
}

/// Apply one issuer's pattern set to plain text (Tier 2). `known_initial`
/// feeds the semantic autocall patterns; run once with `None` to discover
/// the initial price, then again with the discovered value.
pub fn extract_issuer_fields(
    text: &str,
    config: &IssuerConfig,
    known_initial: Option<f64>,
) -> BTreeMap<CanonicalField, FieldMatch> {
    let mut out = BTreeMap::new();

    if let Some((value, index, raw)) = first_dollar_capture(&config.initial, text) {
        out.insert(
            CanonicalField::InitialPrice,
            regex_match(
                CanonicalField::InitialPrice,
                ParsedValue::from_dollar(raw, value),
                index,
                "issuer_initial",
            ),
        );
    }

    let initial = out
        .get(&CanonicalField::InitialPrice)
        .and_then(|m| m.value.dollar)
        .or(known_initial);

    if let Some((value, index, raw)) = first_dollar_capture(&config.threshold, text) {
        out.insert(
            CanonicalField::ThresholdDollar,
            regex_match(
                CanonicalField::ThresholdDollar,
                ParsedValue::from_dollar(raw, value),
                index,
                "issuer_threshold",
            ),
        );
    }

    for (index, pattern) in config.autocall.iter().enumerate() {
        match pattern {
            AutocallPattern::EqualsInitial(regex) => {
                let Some(initial) = initial else { continue };
                if regex.is_match(text) {
                    out.insert(
                        CanonicalField::AutocallLevel,
                        regex_match(
                            CanonicalField::AutocallLevel,
                            ParsedValue::from_dollar("", initial),
                            index,
                            "issuer_autocall_equals_initial",
                        ),
                    );
                    break;
                }
            }
            AutocallPattern::Capture(regex) => {
                if let Some(caps) = regex.captures(text) {
                    if let Some(value) = parse_numeric(&caps[1]) {
                        out.insert(
                            CanonicalField::AutocallLevel,
                            regex_match(
                                CanonicalField::AutocallLevel,
                                ParsedValue::from_dollar(&caps[0], value),
                                index,
                                "issuer_autocall",
                            ),
                        );
                        break;
                    }
                }
            }
        }
    }

    for (index, pattern) in config.coupon.iter().enumerate() {
        match pattern {
            CouponPattern::RatePct(regex) => {
                if let Some(caps) = regex.captures(text) {
                    if let Some(value) = parse_numeric(&caps[1]) {
                        out.insert(
                            CanonicalField::CouponRatePct,
                            regex_match(
                                CanonicalField::CouponRatePct,
                                ParsedValue::from_percent(&caps[0], value),
                                index,
                                "issuer_coupon_rate",
                            ),
                        );
                        break;
                    }
                }
            }
            CouponPattern::Payment(regex) => {
                if let Some(caps) = regex.captures(text) {
                    if let Some(value) = parse_numeric(&caps[1]) {
                        out.insert(
                            CanonicalField::CouponPayment,
                            regex_match(
                                CanonicalField::CouponPayment,
                                ParsedValue::from_dollar(&caps[0], value),
                                index,
                                "issuer_coupon_payment",
                            ),
                        );
                        break;
                    }
                }
            }
        }
    }

    if let Some((value, index, raw)) = first_dollar_capture(&config.notional, text) {
        out.insert(
            CanonicalField::Notional,
            regex_match(
                CanonicalField::Notional,
                ParsedValue::from_dollar(raw, value),
                index,
                "issuer_notional",
            ),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_issuers() {
        assert_eq!(
            detect_issuer("issued by GS Finance Corp and guaranteed").map(|c| c.name),
            Some("Goldman Sachs")
        );
        assert_eq!(
            detect_issuer("JPMorgan Chase Financial Company LLC").map(|c| c.name),
            Some("JP Morgan")
        );
        assert_eq!(
            detect_issuer("Notes linked to shares, issued by UBS AG").map(|c| c.name),
            Some("UBS")
        );
        assert_eq!(detect_issuer("no bank named here"), None);
    }

    #[test]
    fn lookup_by_name_is_case_insensitive() {
        assert!(issuer_by_name("goldman sachs").is_some());
        assert!(issuer_by_name("Barclays").is_some());
        assert!(issuer_by_name("Unknown Bank").is_none());
    }

    #[test]
    fn goldman_initial_and_threshold() {
        let config = issuer_by_name("Goldman Sachs").unwrap();
        let text = "Initial share price: $237.52. \
                    Downside threshold level: $166.264, which is 70% of the initial share price.";
        let fields = extract_issuer_fields(text, config, None);
        assert_eq!(
            fields[&CanonicalField::InitialPrice].value.dollar,
            Some(237.52)
        );
        assert_eq!(
            fields[&CanonicalField::ThresholdDollar].value.dollar,
            Some(166.264)
        );
        assert!(
            fields
                .values()
                .all(|m| m.source == SourceTier::IssuerRegex)
        );
    }

    #[test]
    fn semantic_autocall_needs_known_initial() {
        let config = issuer_by_name("Goldman Sachs").unwrap();
        let text = "called if the price is greater than or equal to the initial share price";

        let without = extract_issuer_fields(text, config, None);
        assert!(!without.contains_key(&CanonicalField::AutocallLevel));

        let with = extract_issuer_fields(text, config, Some(237.52));
        assert_eq!(
            with[&CanonicalField::AutocallLevel].value.dollar,
            Some(237.52)
        );
    }

    #[test]
    fn capturing_autocall_takes_stated_level() {
        let config = issuer_by_name("Morgan Stanley").unwrap();
        let text = "Call threshold level: $425.50 per share";
        let fields = extract_issuer_fields(text, config, None);
        assert_eq!(
            fields[&CanonicalField::AutocallLevel].value.dollar,
            Some(425.50)
        );
    }

    #[test]
    fn ubs_rate_vs_payment_split() {
        let config = issuer_by_name("UBS").unwrap();
        let rate_text = "Contingent Coupon Rate: 9.40% per annum";
        let fields = extract_issuer_fields(rate_text, config, None);
        assert_eq!(
            fields[&CanonicalField::CouponRatePct].value.percent,
            Some(9.4)
        );
        assert!(!fields.contains_key(&CanonicalField::CouponPayment));

        let payment_text = "Contingent Interest Payment of $25.375 per security";
        let fields = extract_issuer_fields(payment_text, config, None);
        assert_eq!(
            fields[&CanonicalField::CouponPayment].value.dollar,
            Some(25.375)
        );
    }

    #[test]
    fn notional_from_per_principal_phrase() {
        let config = issuer_by_name("JP Morgan").unwrap();
        let text = "per $1,000 stated principal amount of securities";
        let fields = extract_issuer_fields(text, config, None);
        assert_eq!(fields[&CanonicalField::Notional].value.dollar, Some(1000.0));
    }

    #[test]
    fn detect_only_issuer_extracts_nothing() {
        let config = issuer_by_name("HSBC").unwrap();
        let text = "Initial share price: $100.00 per share, HSBC USA Inc.";
        assert!(extract_issuer_fields(text, config, None).is_empty());
    }
}
