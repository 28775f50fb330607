use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::model::{CanonicalField, FieldMatch, LabelValuePair, SourceTier};

/// Per-pattern confidence decay; the first pattern for a field is the most
/// specific and scores 1.0, bottoming out at 0.5.
const CONFIDENCE_STEP: f64 = 0.1;
const CONFIDENCE_FLOOR: f64 = 0.5;

struct FieldPatterns {
    field: CanonicalField,
    patterns: Vec<Regex>,
    exclusions: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("label pattern"))
        .collect()
}

fn entry(field: CanonicalField, patterns: &[&str]) -> FieldPatterns {
    FieldPatterns {
        field,
        patterns: compile(patterns),
        exclusions: Vec::new(),
    }
}

fn entry_excluding(field: CanonicalField, patterns: &[&str], exclusions: &[&str]) -> FieldPatterns {
    FieldPatterns {
        field,
        patterns: compile(patterns),
        exclusions: compile(exclusions),
    }
}

// Label vocabulary across Goldman Sachs, JP Morgan, UBS, Morgan Stanley,
// Bank of America, and Barclays term sheets. Order within a field is most
// specific first.
static REGISTRY: Lazy<Vec<FieldPatterns>> = Lazy::new(|| {
    vec![
        entry(
            CanonicalField::InitialPrice,
            &[
                r"initial\s+(?:share\s+)?price",
                r"initial\s+(?:underlier\s+)?value",
                r"initial\s+(?:stock\s+)?price",
                r"initial\s+level",
                r"initial\s+closing\s+(?:price|value|level)",
                r"(?:price|value)\s+on\s+(?:the\s+)?pricing\s+date",
            ],
        ),
        entry(
            CanonicalField::ThresholdDollar,
            &[
                r"downside\s+threshold\s+level",
                r"threshold\s+level",
                r"(?:downside\s+)?threshold\s+(?:price|value|amount)",
                r"interest\s+barrier",
                r"trigger\s+(?:value|price|level)",
                r"coupon\s+barrier",
                r"barrier\s+level",
                r"(?:knock[- ]?in)\s+(?:barrier\s+)?(?:level|price|value)",
            ],
        ),
        entry(
            CanonicalField::ThresholdPct,
            &[
                r"downside\s+threshold\s+level.*%",
                r"threshold\s+level.*%",
                r"barrier\s+(?:level|percentage).*%",
            ],
        ),
        entry(
            CanonicalField::AutocallLevel,
            &[
                r"call\s+threshold\s+level",
                r"(?:early\s+)?redemption\s+(?:threshold|level|price|trigger)",
                r"autocall\s+(?:trigger\s+)?(?:level|price|value)",
                r"call\s+level",
                r"call\s+price",
            ],
        ),
        entry(
            CanonicalField::CouponPayment,
            &[
                r"contingent\s+(?:quarterly|monthly|semi[- ]?annual|annual)\s+(?:coupon|payment)",
                r"contingent\s+interest\s+payment",
                r"contingent\s+coupon\s+(?:payment|amount)",
                r"coupon\s+(?:payment|amount)\s+per\s+(?:security|note)",
                r"interest\s+(?:payment|amount)\s+per\s+(?:security|note)",
            ],
        ),
        entry(
            CanonicalField::CouponRatePct,
            &[
                r"contingent\s+coupon\s+rate",
                r"contingent\s+interest\s+rate",
                r"coupon\s+rate",
                r"annual\s+coupon\s+rate",
                r"interest\s+rate\s+per\s+annum",
            ],
        ),
        // "Aggregate principal amount" is the total offering size, not the
        // per-security notional.
        entry_excluding(
            CanonicalField::Notional,
            &[
                r"(?:stated\s+)?principal\s+amount\s+per\s+(?:security|note)",
                r"(?:stated\s+)?principal\s+amount(?:/original\s+issue\s+price)?",
                r"denomination",
                r"face\s+(?:amount|value)",
                r"notional\s+amount",
            ],
            &[r"aggregate"],
        ),
        entry(
            CanonicalField::MaturityDate,
            &[r"maturity\s+date", r"final\s+(?:valuation|payment)\s+date"],
        ),
        entry(
            CanonicalField::PricingDate,
            &[
                r"pricing\s+date",
                r"(?:initial\s+)?valuation\s+date",
                r"trade\s+date",
                r"strike\s+date",
            ],
        ),
        entry(
            CanonicalField::IssueDate,
            &[r"(?:original\s+)?issue\s+date", r"settlement\s+date"],
        ),
        entry(CanonicalField::Issuer, &[r"issuer"]),
        entry(
            CanonicalField::Underlying,
            &[
                r"underlying(?:\s+(?:stock|security|asset|index))?",
                r"reference\s+(?:stock|asset|index|security)",
            ],
        ),
        entry(CanonicalField::Cusip, &[r"cusip"]),
        entry(CanonicalField::Isin, &[r"isin"]),
        entry(
            CanonicalField::PaymentFrequency,
            &[
                r"(?:coupon\s+)?payment\s+frequency",
                r"(?:interest\s+)?payment\s+(?:period|frequency|schedule)",
                r"observation\s+frequency",
            ],
        ),
    ]
});

/// Resolve mined label/value pairs to canonical fields (Tier 1). For each
/// field the highest-confidence candidate wins; ties keep the first pair
/// encountered.
pub fn match_labels(pairs: &[LabelValuePair]) -> BTreeMap<CanonicalField, FieldMatch> {
    let mut matched: BTreeMap<CanonicalField, FieldMatch> = BTreeMap::new();

    for field_patterns in REGISTRY.iter() {
        for pair in pairs {
            if field_patterns
                .exclusions
                .iter()
                .any(|exclusion| exclusion.is_match(&pair.label))
            {
                continue;
            }

            for (pattern_index, pattern) in field_patterns.patterns.iter().enumerate() {
                if !pattern.is_match(&pair.label) {
                    continue;
                }
                let confidence =
                    (1.0 - CONFIDENCE_STEP * pattern_index as f64).max(CONFIDENCE_FLOOR);
                let replace = matched
                    .get(&field_patterns.field)
                    .is_none_or(|existing| confidence > existing.confidence);
                if replace {
                    matched.insert(
                        field_patterns.field,
                        FieldMatch {
                            field: field_patterns.field,
                            value: pair.value.clone(),
                            confidence,
                            source: SourceTier::Table,
                            label: pair.label.clone(),
                        },
                    );
                }
                break;
            }
        }
    }

    debug!(fields = matched.len(), "label matching complete");
    matched
}
