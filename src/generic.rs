use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::model::{CanonicalField, FieldMatch, ParsedValue, SourceTier};
use crate::value::parse_numeric;

/// Context window around keyword hits. Keeping this bounded also bounds
/// regex evaluation over adversarial documents.
const CONTEXT_WINDOW: usize = 250;
/// When a stated threshold dollar and percent disagree by more than this
/// many percentage points, the percent is trusted and the dollar
/// recomputed; free text states the percent more reliably.
const THRESHOLD_PCT_TOLERANCE: f64 = 2.0;
/// A dollar autocall candidate above this multiple of the initial price is
/// almost certainly an aggregate principal figure, not a per-security
/// level.
const AUTOCALL_MAX_INITIAL_MULTIPLE: f64 = 5.0;
/// Acceptable band for percent-stated autocall levels.
const AUTOCALL_PCT_MIN: f64 = 50.0;
const AUTOCALL_PCT_MAX: f64 = 150.0;

static MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$?\s*([0-9]{1,3}(?:,[0-9]{3})*(?:\.[0-9]+)?|[0-9]+(?:\.[0-9]+)?)")
        .expect("money regex")
});

static PCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*%").expect("percent regex"));

fn generic_match(field: CanonicalField, value: ParsedValue, label: &str) -> FieldMatch {
    FieldMatch {
        field,
        value,
        confidence: 0.5,
        source: SourceTier::GenericRegex,
        label: label.to_string(),
    }
}

fn clamp_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn window(text: &str, start: usize, end: usize) -> &str {
    &text[clamp_boundary(text, start)..clamp_boundary(text, end)]
}

fn search_dollar(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|caps| parse_numeric(&caps[1]))
}

/// Issuer-agnostic extraction of initial price and threshold (Tier 3).
/// Initial price cascades from the most specific phrasing to the
/// broadest; the threshold scan prefers high-precision decimal figures in
/// a tight window after threshold-like headings.
pub fn extract_initial_and_threshold(text: &str) -> BTreeMap<CanonicalField, FieldMatch> {
    static INITIAL_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)Initial\s+Value[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)")
            .expect("initial value regex")
    });
    static INITIAL_PRICE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)Initial\s+price[^$]{0,30}\$\s*([0-9,]+(?:\.[0-9]+)?)")
            .expect("initial price regex")
    });
    static INITIAL_LABELED_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)Initial\s+(?:Share|Stock)\s+Price[^:$]*:\s*\$?\s*([0-9,]+(?:\.[0-9]+)?)")
            .expect("initial labeled regex")
    });
    static INITIAL_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\bInitial\s+(?:Share|Stock)\s+Price\b").expect("initial heading regex")
    });
    static INITIAL_BROAD_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)initial\s+share\s+price[^$]*\$\s*([0-9,]+(?:\.[0-9]+)?)")
            .expect("initial broad regex")
    });
    static DOLLAR_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\$\s*([0-9,]+(?:\.[0-9]+)?)").expect("dollar regex"));

    let mut out = BTreeMap::new();

    let mut initial = search_dollar(&INITIAL_VALUE_RE, text)
        .or_else(|| search_dollar(&INITIAL_PRICE_RE, text))
        .or_else(|| search_dollar(&INITIAL_LABELED_RE, text));
    if initial.is_none() {
        for found in INITIAL_HEADING_RE.find_iter(text) {
            let snippet = window(text, found.end(), found.end() + 200);
            if let Some(value) = search_dollar(&DOLLAR_RE, snippet) {
                initial = Some(value);
                break;
            }
        }
    }
    if initial.is_none() {
        initial = search_dollar(&INITIAL_BROAD_RE, text);
    }

    if let Some(value) = initial {
        out.insert(
            CanonicalField::InitialPrice,
            generic_match(
                CanonicalField::InitialPrice,
                ParsedValue::from_dollar("", value),
                "generic_initial",
            ),
        );
    }

    // Threshold: a tight window after threshold-like headings, preferring
    // a high-precision decimal dollar over a loose match.
    static THRESHOLD_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)interest\s+barrier|trigger\s+value|downside\s+threshold\s+level|threshold\s+level|barrier\s+level",
        )
        .expect("threshold heading regex")
    });
    static PRECISE_DOLLAR_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\$?\s*([0-9]{2,5}\.[0-9]{2,5})").expect("precise dollar regex"));
    static THRESHOLD_PCT_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)([0-9]+(?:\.[0-9]+)?)\s*%\s*(?:of\s+the\s+initial\s+(?:value|share\s+price))?",
        )
        .expect("threshold pct regex")
    });
    static THRESHOLD_WIDE_DOLLAR_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)threshold\s+level[^$]*\$\s*([0-9,]+(?:\.[0-9]+)?)")
            .expect("threshold wide dollar regex")
    });
    static THRESHOLD_WIDE_PCT_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)threshold\s+level[^%]*?([0-9]+(?:\.[0-9]+)?)\s*%")
            .expect("threshold wide pct regex")
    });

    let mut threshold_dollar: Option<f64> = None;
    let mut threshold_pct: Option<f64> = None;

    for found in THRESHOLD_HEADING_RE.find_iter(text) {
        let snippet = window(text, found.end(), found.end() + CONTEXT_WINDOW);

        let dollar =
            search_dollar(&PRECISE_DOLLAR_RE, snippet).or_else(|| search_dollar(&MONEY_RE, snippet));
        let pct = THRESHOLD_PCT_RE
            .captures(snippet)
            .and_then(|caps| parse_numeric(&caps[1]));

        if dollar.is_some() {
            threshold_dollar = dollar;
        }
        if pct.is_some() {
            threshold_pct = pct;
        }
        if threshold_dollar.is_some() || threshold_pct.is_some() {
            break;
        }
    }

    if threshold_dollar.is_none() {
        threshold_dollar = search_dollar(&THRESHOLD_WIDE_DOLLAR_RE, text);
    }
    if threshold_pct.is_none() {
        threshold_pct = THRESHOLD_WIDE_PCT_RE
            .captures(text)
            .and_then(|caps| parse_numeric(&caps[1]));
    }

    if threshold_dollar.is_none() {
        if let (Some(pct), Some(initial)) = (threshold_pct, initial) {
            threshold_dollar = Some(initial * pct / 100.0);
        }
    }

    if let (Some(dollar), Some(pct), Some(initial)) = (threshold_dollar, threshold_pct, initial) {
        let implied_pct = dollar / initial * 100.0;
        if (implied_pct - pct).abs() > THRESHOLD_PCT_TOLERANCE {
            debug!(
                stated_dollar = dollar,
                stated_pct = pct,
                implied_pct,
                "threshold dollar disagrees with percent; recomputing from percent"
            );
            threshold_dollar = Some(initial * pct / 100.0);
        }
    }

    if let Some(value) = threshold_dollar {
        out.insert(
            CanonicalField::ThresholdDollar,
            generic_match(
                CanonicalField::ThresholdDollar,
                ParsedValue::from_dollar("", value),
                "generic_threshold",
            ),
        );
    }

    out
}

/// Generic autocall level (Tier 3). Semantic equals-initial phrasings are
/// checked first; windowed dollar/percent extraction around autocall
/// keywords runs behind the sanity guards.
pub fn extract_autocall(text: &str, initial: Option<f64>) -> Option<FieldMatch> {
    static EQUALS_INITIAL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
        const TAIL: &str = r"the\s+initial\s+(?:share\s+)?(?:price|value|underlier\s+value|level)";
        [
            format!(r"(?i)greater\s+than\s+or\s+equal\s+to\s+{TAIL}"),
            format!(r"(?i)equal\s+to\s+or\s+greater\s+than\s+{TAIL}"),
            format!(r"(?i)at\s+or\s+above\s+{TAIL}"),
            format!(r"(?i)at\s+least\s+(?:equal\s+to\s+)?{TAIL}"),
            r"(?i)automatic(?:ally)?\s+call(?:ed)?".to_string(),
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("equals-initial regex"))
        .collect()
    });
    static HUNDRED_PCT_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)\b100\s*%\s*(?:of\s+the\s+initial|initial\s+(?:share\s+)?(?:price|value|underlier\s+value|level))",
        )
        .expect("hundred pct regex")
    });
    static AUTOCALL_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)automatic(?:ally)?\s+call(?:ed)?|autocall|early\s+redemption")
            .expect("autocall keyword regex")
    });
    static CALL_LEVEL_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)call\s+threshold\s+level|call\s+level|redemption\s+trigger|redemption\s+level")
            .expect("call level regex")
    });
    // Explicit $ required here so the integer part of "105%" is not read
    // as a dollar level; percent-stated levels go through the band check.
    static STRICT_DOLLAR_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\$\s*([0-9,]+(?:\.[0-9]+)?)").expect("strict dollar regex"));

    if let Some(initial) = initial {
        for regex in EQUALS_INITIAL_RES.iter() {
            if regex.is_match(text) {
                return Some(generic_match(
                    CanonicalField::AutocallLevel,
                    ParsedValue::from_dollar("", initial),
                    "generic_autocall_equals_initial",
                ));
            }
        }
        if HUNDRED_PCT_RE.is_match(text) {
            return Some(generic_match(
                CanonicalField::AutocallLevel,
                ParsedValue::from_dollar("", initial),
                "generic_autocall_100pct",
            ));
        }
    }

    let mut candidates: Vec<&str> = Vec::new();
    for keyword_regex in [&*AUTOCALL_KEYWORD_RE, &*CALL_LEVEL_RE] {
        for found in keyword_regex.find_iter(text) {
            let start = found.start().saturating_sub(CONTEXT_WINDOW);
            candidates.push(window(text, start, found.end() + CONTEXT_WINDOW));
        }
    }

    for snippet in candidates {
        if let Some(value) = search_dollar(&STRICT_DOLLAR_RE, snippet) {
            // Large dollar figures near autocall language are aggregate
            // principal amounts, not per-security levels.
            if let Some(initial) = initial {
                if value > initial * AUTOCALL_MAX_INITIAL_MULTIPLE {
                    debug!(candidate = value, initial, "rejecting oversized autocall candidate");
                    continue;
                }
            }
            return Some(generic_match(
                CanonicalField::AutocallLevel,
                ParsedValue::from_dollar("", value),
                "generic_autocall",
            ));
        }
        if let (Some(caps), Some(initial)) = (PCT_RE.captures(snippet), initial) {
            if let Some(pct) = parse_numeric(&caps[1]) {
                if (AUTOCALL_PCT_MIN..=AUTOCALL_PCT_MAX).contains(&pct) {
                    return Some(generic_match(
                        CanonicalField::AutocallLevel,
                        ParsedValue::from_dollar("", initial * pct / 100.0),
                        "generic_autocall_pct",
                    ));
                }
            }
        }
    }

    None
}

/// Generic annual coupon rate (Tier 3). Stated once near a fixed phrase,
/// so no windowing.
pub fn extract_coupon_rate(text: &str) -> Option<FieldMatch> {
    static PER_ANNUM_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*%\s*(?:per\s*annum|p\.a\.|annual)")
            .expect("per annum regex")
    });
    static CONTINGENT_RATE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)Contingent\s+Interest\s+Rate[^:]*:\s*([0-9]+(?:\.[0-9]+)?)\s*%")
            .expect("contingent rate regex")
    });

    if let Some(caps) = PER_ANNUM_RE.captures(text) {
        let value = parse_numeric(&caps[1])?;
        return Some(generic_match(
            CanonicalField::CouponRatePct,
            ParsedValue::from_percent(&caps[0], value),
            "generic_coupon_rate_annual",
        ));
    }
    if let Some(caps) = CONTINGENT_RATE_RE.captures(text) {
        let value = parse_numeric(&caps[1])?;
        return Some(generic_match(
            CanonicalField::CouponRatePct,
            ParsedValue::from_percent(&caps[0], value),
            "generic_contingent_interest_rate",
        ));
    }
    None
}

/// Generic per-period coupon payment (Tier 3).
pub fn extract_coupon_payment(text: &str) -> Option<FieldMatch> {
    static COUPON_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)Contingent\s+(?:quarterly|monthly|semi-annual|annual)\s+coupon[^$]{0,50}\$\s*([0-9,]+(?:\.[0-9]+)?)",
        )
        .expect("coupon payment regex")
    });
    static INTEREST_PAYMENT_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)Contingent\s+Interest\s+Payment[^$]{0,200}\$\s*([0-9,]+(?:\.[0-9]+)?)")
            .expect("interest payment regex")
    });

    for (regex, label) in [
        (&*COUPON_RE, "generic_coupon_payment"),
        (&*INTEREST_PAYMENT_RE, "generic_interest_payment"),
    ] {
        if let Some(caps) = regex.captures(text) {
            if let Some(value) = parse_numeric(&caps[1]) {
                return Some(generic_match(
                    CanonicalField::CouponPayment,
                    ParsedValue::from_dollar(&caps[0], value),
                    label,
                ));
            }
        }
    }
    None
}

/// Generic per-security notional (Tier 3).
pub fn extract_notional(text: &str) -> Option<FieldMatch> {
    static NOTIONAL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
        [
            r"(?i)per\s+\$\s*([0-9,]+(?:\.[0-9]+)?)\s+(?:stated\s+)?principal\s+amount",
            r"(?i)(?:stated\s+)?principal\s+amount\s+of\s+\$\s*([0-9,]+(?:\.[0-9]+)?)",
            r"(?i)each\s+(?:security|note)\s+has\s+a\s+(?:stated\s+)?principal\s+amount\s+of\s+\$\s*([0-9,]+(?:\.[0-9]+)?)",
            r"(?i)principal\s+amount\s+per\s+(?:security|note)[:\s]+\$\s*([0-9,]+(?:\.[0-9]+)?)",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("notional regex"))
        .collect()
    });

    for regex in NOTIONAL_RES.iter() {
        if let Some(caps) = regex.captures(text) {
            if let Some(value) = parse_numeric(&caps[1]) {
                return Some(generic_match(
                    CanonicalField::Notional,
                    ParsedValue::from_dollar(&caps[0], value),
                    "generic_notional",
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_from_labeled_value() {
        let text = "The Initial Value, which is $198.35, was set on the pricing date.";
        let fields = extract_initial_and_threshold(text);
        assert_eq!(
            fields[&CanonicalField::InitialPrice].value.dollar,
            Some(198.35)
        );
        assert_eq!(
            fields[&CanonicalField::InitialPrice].source,
            SourceTier::GenericRegex
        );
    }

    #[test]
    fn initial_from_heading_window() {
        let text = "Initial Share Price as determined on the pricing date \
                    equal to the closing price of $87.22 per share";
        let fields = extract_initial_and_threshold(text);
        assert_eq!(
            fields[&CanonicalField::InitialPrice].value.dollar,
            Some(87.22)
        );
    }

    #[test]
    fn threshold_from_barrier_heading() {
        let text = "Initial Value: $198.35. The Interest Barrier of $138.845 \
                    applies on each review date.";
        let fields = extract_initial_and_threshold(text);
        assert_eq!(
            fields[&CanonicalField::ThresholdDollar].value.dollar,
            Some(138.845)
        );
    }

    #[test]
    fn threshold_dollar_computed_from_percent() {
        let text = "Initial price of $200.00 per share. \
                    The threshold level is 70% of the initial value.";
        let fields = extract_initial_and_threshold(text);
        let dollar = fields[&CanonicalField::ThresholdDollar].value.dollar.unwrap();
        assert!((dollar - 140.0).abs() < 0.01);
    }

    #[test]
    fn disagreeing_dollar_recomputed_from_percent() {
        // $120 against a stated 70% of $200 disagrees by 10 points; the
        // percent wins.
        let text = "Initial price of $200.00. \
                    Downside threshold level: $120.00 (70.00% of the initial value)";
        let fields = extract_initial_and_threshold(text);
        let dollar = fields[&CanonicalField::ThresholdDollar].value.dollar.unwrap();
        assert!((dollar - 140.0).abs() < 0.01);
    }

    #[test]
    fn autocall_equals_initial_phrase() {
        let text = "The notes will be automatically called if the closing price \
                    is at or above the initial price on any observation date.";
        let field_match = extract_autocall(text, Some(150.0)).unwrap();
        assert_eq!(field_match.value.dollar, Some(150.0));
        assert_eq!(field_match.label, "generic_autocall_equals_initial");
    }

    #[test]
    fn autocall_without_initial_yields_nothing_semantic() {
        let text = "greater than or equal to the initial price";
        assert!(extract_autocall(text, None).is_none());
    }

    #[test]
    fn autocall_rejects_aggregate_principal() {
        let text = "subject to early redemption; $1,000,000 aggregate principal amount";
        assert!(extract_autocall(text, Some(100.0)).is_none());
    }

    #[test]
    fn autocall_percent_inside_band() {
        let text = "subject to early redemption at 105% of the stated level";
        let field_match = extract_autocall(text, Some(100.0)).unwrap();
        assert_eq!(field_match.value.dollar, Some(105.0));
        assert_eq!(field_match.label, "generic_autocall_pct");
    }

    #[test]
    fn coupon_rate_per_annum() {
        let field_match = extract_coupon_rate("a contingent coupon of 9.40% per annum").unwrap();
        assert_eq!(field_match.value.percent, Some(9.4));
    }

    #[test]
    fn coupon_payment_from_contingent_phrase() {
        let field_match =
            extract_coupon_payment("Contingent quarterly coupon of $0.5375 per security").unwrap();
        assert_eq!(field_match.value.dollar, Some(0.5375));
    }

    #[test]
    fn notional_from_per_principal() {
        let field_match = extract_notional("per $1,000 stated principal amount").unwrap();
        assert_eq!(field_match.value.dollar, Some(1000.0));
    }

    #[test]
    fn nothing_found_in_unrelated_text() {
        assert!(extract_initial_and_threshold("nothing to see here").is_empty());
        assert!(extract_autocall("nothing to see here", Some(100.0)).is_none());
        assert!(extract_coupon_rate("nothing to see here").is_none());
        assert!(extract_coupon_payment("nothing to see here").is_none());
        assert!(extract_notional("nothing to see here").is_none());
    }
}
