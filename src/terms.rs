use std::ops::RangeInclusive;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TermConfidence {
    High,
    Medium,
}

/// One extracted product term: the numeric value plus the snippet it came
/// from. Confidence is high only when the most specific pattern hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermValue {
    pub value: f64,
    pub unit: &'static str,
    pub raw: String,
    pub confidence: TermConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionType {
    Conditional,
    Unconditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermUnit {
    Years,
    Months,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermLength {
    pub value: u32,
    pub unit: TermUnit,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
    AtMaturity,
    European,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BasketType {
    WorstOf,
    BestOf,
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayoffType {
    AutocallableCoupon,
    Autocallable,
    BufferedParticipation,
    BarrierParticipation,
    RangeAccrual,
    CappedParticipation,
    ReverseConvertible,
    LeveragedParticipation,
    PrincipalProtected,
    #[default]
    Unknown,
}

/// Supplemental terms extracted independently of the tiered pipeline and
/// merged alongside its output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductTerms {
    pub participation_rate: Option<TermValue>,
    pub cap: Option<TermValue>,
    pub floor: Option<TermValue>,
    pub barrier: Option<TermValue>,
    pub knock_in: Option<TermValue>,
    pub knock_out: Option<TermValue>,
    pub autocall_trigger: Option<TermValue>,
    pub coupon: Option<TermValue>,
    pub gearing: Option<TermValue>,
    pub leverage: Option<TermValue>,
    pub buffer: Option<TermValue>,
    pub principal_protection: Option<TermValue>,
    pub protection_type: Option<ProtectionType>,
    pub term_length: Option<TermLength>,
    pub is_autocallable: bool,
    pub observation_frequency: Option<ObservationFrequency>,
    pub basket_type: Option<BasketType>,
    pub num_underlyings: Option<u32>,
    pub payoff_type: PayoffType,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("term pattern"))
        .collect()
}

struct TermPatternSet {
    participation: Vec<Regex>,
    cap: Vec<Regex>,
    floor: Vec<Regex>,
    barrier: Vec<Regex>,
    knock_in: Vec<Regex>,
    knock_out: Vec<Regex>,
    autocall: Vec<Regex>,
    coupon: Vec<Regex>,
    gearing: Vec<Regex>,
    leverage: Vec<Regex>,
    buffer: Vec<Regex>,
    protection: Vec<Regex>,
    conditional: Vec<Regex>,
    term_length: Vec<(TermUnit, Regex)>,
    autocallable: Vec<Regex>,
    frequency: Vec<(ObservationFrequency, Regex)>,
    continuous: Regex,
    baskets: Vec<(BasketType, Vec<Regex>)>,
    num_underlyings: Vec<Regex>,
}

static PATTERNS: Lazy<TermPatternSet> = Lazy::new(|| TermPatternSet {
    participation: compile(&[
        r"participation\s+(?:rate\s+)?(?:of\s+)?(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+participation",
        r"participates?\s+at\s+(\d+(?:\.\d+)?)\s*%",
    ]),
    cap: compile(&[
        r"(?:capped\s+at|cap\s+of|maximum\s+return\s+of|cap\s+level\s+of)\s+(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+cap",
        r"cap:\s*(\d+(?:\.\d+)?)\s*%",
    ]),
    floor: compile(&[
        r"(?:floor\s+of|minimum\s+return\s+of|floor\s+at)\s+(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+floor",
        r"floor:\s*(\d+(?:\.\d+)?)\s*%",
    ]),
    barrier: compile(&[
        r"(?:barrier\s+(?:at|of|level)?|protection\s+(?:at|of|level)?)\s+(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+barrier",
        r"barrier:\s*(\d+(?:\.\d+)?)\s*%",
    ]),
    knock_in: compile(&[
        r"knock[- ]?in\s+(?:barrier\s+)?(?:at\s+)?(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+knock[- ]?in",
    ]),
    knock_out: compile(&[
        r"knock[- ]?out\s+(?:barrier\s+)?(?:at\s+)?(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+knock[- ]?out",
    ]),
    autocall: compile(&[
        r"autocall\s+(?:trigger\s+)?(?:at\s+)?(\d+(?:\.\d+)?)\s*%",
        r"(?:early\s+redemption|callable)\s+at\s+(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+autocall",
    ]),
    coupon: compile(&[
        r"(?:coupon\s+(?:rate\s+)?(?:of\s+)?|pays\s+|payment\s+of\s+)(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+(?:per\s+)?(?:annum|annual|coupon)",
    ]),
    gearing: compile(&[
        r"gearing\s+(?:of\s+)?(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+gearing",
        r"gearing:\s*(\d+(?:\.\d+)?)\s*%",
    ]),
    leverage: compile(&[
        r"leverage\s+(?:of\s+)?(\d+(?:\.\d+)?)\s*x",
        r"(\d+(?:\.\d+)?)\s*x\s+leverage",
    ]),
    buffer: compile(&[
        r"buffer\s+(?:of\s+)?(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+buffer",
        r"downside\s+protection\s+of\s+(\d+(?:\.\d+)?)\s*%",
    ]),
    protection: compile(&[
        r"(\d+(?:\.\d+)?)\s*%\s+principal\s+protection",
        r"principal\s+protection\s+of\s+(\d+(?:\.\d+)?)\s*%",
        r"(\d+(?:\.\d+)?)\s*%\s+protected",
        r"capital\s+protection\s+of\s+(\d+(?:\.\d+)?)\s*%",
    ]),
    conditional: compile(&[
        r"conditional\s+protection",
        r"contingent\s+protection",
        r"protection\s+(?:is\s+)?contingent\s+(?:on|upon)",
    ]),
    term_length: vec![
        (
            TermUnit::Years,
            Regex::new(r"(?i)(\d+)[- ]year\s+term").expect("term pattern"),
        ),
        (
            TermUnit::Years,
            Regex::new(r"(?i)term\s+of\s+(\d+)\s+years?").expect("term pattern"),
        ),
        (
            TermUnit::Months,
            Regex::new(r"(?i)(\d+)[- ]month\s+term").expect("term pattern"),
        ),
        (
            TermUnit::Months,
            Regex::new(r"(?i)term\s+of\s+(\d+)\s+months?").expect("term pattern"),
        ),
    ],
    autocallable: compile(&[
        r"autocallable",
        r"auto[- ]?callable",
        r"early\s+redemption",
        r"callable",
    ]),
    frequency: vec![
        (
            ObservationFrequency::Daily,
            Regex::new(r"(?i)daily\s+observation").expect("frequency pattern"),
        ),
        (
            ObservationFrequency::Weekly,
            Regex::new(r"(?i)weekly\s+observation").expect("frequency pattern"),
        ),
        (
            ObservationFrequency::Monthly,
            Regex::new(r"(?i)monthly\s+observation").expect("frequency pattern"),
        ),
        (
            ObservationFrequency::Quarterly,
            Regex::new(r"(?i)quarterly\s+observation").expect("frequency pattern"),
        ),
        (
            ObservationFrequency::Annual,
            Regex::new(r"(?i)annual(?:ly)?\s+observation").expect("frequency pattern"),
        ),
        (
            ObservationFrequency::AtMaturity,
            Regex::new(r"(?i)observation\s+at\s+maturity").expect("frequency pattern"),
        ),
        (
            ObservationFrequency::European,
            Regex::new(r"(?i)european\s+(?:style|barrier)").expect("frequency pattern"),
        ),
    ],
    continuous: Regex::new(r"(?i)continuous(?:ly)?\s+observed").expect("frequency pattern"),
    baskets: vec![
        (
            BasketType::WorstOf,
            compile(&[r"worst[- ]of", r"worst\s+performing", r"lowest\s+performing"]),
        ),
        (
            BasketType::BestOf,
            compile(&[r"best[- ]of", r"best\s+performing", r"highest\s+performing"]),
        ),
        (
            BasketType::Average,
            compile(&[
                r"average\s+performance",
                r"equally[- ]weighted",
                r"basket\s+average",
            ]),
        ),
    ],
    num_underlyings: compile(&[
        r"basket\s+of\s+(\d+)\s+(?:stocks|indices|underlyings)",
        r"(\d+)\s+underlyings?",
        r"linked\s+to\s+(\d+)\s+(?:stocks|indices)",
    ]),
});

/// Pull a single term out of `text`, trying patterns most specific first
/// and discarding values outside the plausible range for that term.
fn extract_term(
    text: &str,
    name: &str,
    patterns: &[Regex],
    range: RangeInclusive<f64>,
    unit: &'static str,
) -> Option<TermValue> {
    for (pattern_index, pattern) in patterns.iter().enumerate() {
        for caps in pattern.captures_iter(text) {
            let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
                continue;
            };
            if !range.contains(&value) {
                warn!(term = name, value, "extracted value outside plausible range, skipping");
                continue;
            }
            return Some(TermValue {
                value,
                unit,
                raw: caps[0].to_string(),
                confidence: if pattern_index == 0 {
                    TermConfidence::High
                } else {
                    TermConfidence::Medium
                },
            });
        }
    }
    None
}

/// Extract supplemental product terms from plain text and classify the
/// likely payoff type.
pub fn extract_product_terms(text: &str) -> ProductTerms {
    let patterns = &*PATTERNS;
    let mut terms = ProductTerms {
        participation_rate: extract_term(
            text,
            "participation_rate",
            &patterns.participation,
            0.0..=500.0,
            "%",
        ),
        cap: extract_term(text, "cap", &patterns.cap, 0.0..=500.0, "%"),
        floor: extract_term(text, "floor", &patterns.floor, -100.0..=100.0, "%"),
        barrier: extract_term(text, "barrier", &patterns.barrier, 0.0..=100.0, "%"),
        knock_in: extract_term(text, "knock_in", &patterns.knock_in, 0.0..=100.0, "%"),
        knock_out: extract_term(text, "knock_out", &patterns.knock_out, 100.0..=500.0, "%"),
        autocall_trigger: extract_term(text, "autocall", &patterns.autocall, 100.0..=200.0, "%"),
        coupon: extract_term(text, "coupon", &patterns.coupon, 0.0..=50.0, "%"),
        gearing: extract_term(text, "gearing", &patterns.gearing, 0.0..=500.0, "%"),
        leverage: extract_term(text, "leverage", &patterns.leverage, 0.0..=20.0, "x"),
        buffer: extract_term(text, "buffer", &patterns.buffer, 0.0..=100.0, "%"),
        principal_protection: extract_term(
            text,
            "principal_protection",
            &patterns.protection,
            0.0..=100.0,
            "%",
        ),
        ..ProductTerms::default()
    };

    if patterns.conditional.iter().any(|p| p.is_match(text)) {
        terms.protection_type = Some(ProtectionType::Conditional);
    } else if terms.principal_protection.is_some() {
        terms.protection_type = Some(ProtectionType::Unconditional);
    }

    for (unit, pattern) in &patterns.term_length {
        if let Some(caps) = pattern.captures(text) {
            if let Ok(value) = caps[1].parse::<u32>() {
                terms.term_length = Some(TermLength {
                    value,
                    unit: *unit,
                    raw: caps[0].to_string(),
                });
                break;
            }
        }
    }

    terms.is_autocallable = patterns.autocallable.iter().any(|p| p.is_match(text));

    for (frequency, pattern) in &patterns.frequency {
        if pattern.is_match(text) {
            terms.observation_frequency = Some(*frequency);
            break;
        }
    }
    if patterns.continuous.is_match(text) {
        terms.observation_frequency = Some(ObservationFrequency::Continuous);
    }

    'baskets: for (basket, basket_patterns) in &patterns.baskets {
        for pattern in basket_patterns {
            if pattern.is_match(text) {
                terms.basket_type = Some(*basket);
                break 'baskets;
            }
        }
    }
    if terms.basket_type.is_none() {
        for pattern in &patterns.num_underlyings {
            if let Some(caps) = pattern.captures(text) {
                if let Ok(count) = caps[1].parse::<u32>() {
                    if (2..=100).contains(&count) {
                        terms.num_underlyings = Some(count);
                        break;
                    }
                }
            }
        }
    }

    terms.payoff_type = classify_payoff(&terms);
    debug!(payoff = ?terms.payoff_type, "product term extraction complete");
    terms
}

/// Infer the payoff shape from whichever terms were present.
pub fn classify_payoff(terms: &ProductTerms) -> PayoffType {
    let has_autocall = terms.autocall_trigger.is_some() || terms.is_autocallable;
    let has_participation = terms.participation_rate.is_some();
    let fully_protected = terms
        .principal_protection
        .as_ref()
        .is_some_and(|p| p.value == 100.0);

    if has_autocall && terms.coupon.is_some() {
        PayoffType::AutocallableCoupon
    } else if has_autocall {
        PayoffType::Autocallable
    } else if terms.buffer.is_some() && has_participation {
        PayoffType::BufferedParticipation
    } else if terms.barrier.is_some() && has_participation {
        PayoffType::BarrierParticipation
    } else if terms.cap.is_some() && terms.floor.is_some() {
        PayoffType::RangeAccrual
    } else if terms.cap.is_some() && has_participation {
        PayoffType::CappedParticipation
    } else if terms.coupon.is_some() && terms.barrier.is_some() {
        PayoffType::ReverseConvertible
    } else if has_participation && terms.cap.is_none() {
        PayoffType::LeveragedParticipation
    } else if fully_protected {
        PayoffType::PrincipalProtected
    } else {
        PayoffType::Unknown
    }
}
