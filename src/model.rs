use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::terms::ProductTerms;

/// Issuer-independent output slots populated by the extraction tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    InitialPrice,
    ThresholdDollar,
    ThresholdPct,
    AutocallLevel,
    CouponPayment,
    CouponRatePct,
    ContingentPaymentPct,
    Notional,
    MaturityDate,
    PricingDate,
    IssueDate,
    Issuer,
    Underlying,
    Cusip,
    Isin,
    PaymentFrequency,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::InitialPrice => "initial_price",
            CanonicalField::ThresholdDollar => "threshold_dollar",
            CanonicalField::ThresholdPct => "threshold_pct",
            CanonicalField::AutocallLevel => "autocall_level",
            CanonicalField::CouponPayment => "coupon_payment",
            CanonicalField::CouponRatePct => "coupon_rate_pct",
            CanonicalField::ContingentPaymentPct => "contingent_payment_pct",
            CanonicalField::Notional => "notional",
            CanonicalField::MaturityDate => "maturity_date",
            CanonicalField::PricingDate => "pricing_date",
            CanonicalField::IssueDate => "issue_date",
            CanonicalField::Issuer => "issuer",
            CanonicalField::Underlying => "underlying",
            CanonicalField::Cusip => "cusip",
            CanonicalField::Isin => "isin",
            CanonicalField::PaymentFrequency => "payment_frequency",
        }
    }
}

/// Where a winning value came from. Precedence during merge is
/// Table > IssuerRegex > GenericRegex > Derived > Default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceTier {
    #[serde(rename = "table")]
    Table,
    #[serde(rename = "regex_issuer")]
    IssuerRegex,
    #[serde(rename = "regex_generic")]
    GenericRegex,
    #[serde(rename = "derived")]
    Derived,
    #[serde(rename = "derived_from_annual_rate")]
    DerivedFromAnnualRate,
    #[serde(rename = "derived_from_payment_and_notional")]
    DerivedFromPaymentAndNotional,
    #[serde(rename = "default_equals_initial")]
    DefaultEqualsInitial,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Table => "table",
            SourceTier::IssuerRegex => "regex_issuer",
            SourceTier::GenericRegex => "regex_generic",
            SourceTier::Derived => "derived",
            SourceTier::DerivedFromAnnualRate => "derived_from_annual_rate",
            SourceTier::DerivedFromPaymentAndNotional => "derived_from_payment_and_notional",
            SourceTier::DefaultEqualsInitial => "default_equals_initial",
        }
    }
}

/// A raw snippet decoded into whatever typed values it contains. All typed
/// fields are None when nothing matched; `raw` is always preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedValue {
    pub raw: String,
    pub dollar: Option<f64>,
    pub percent: Option<f64>,
    /// Set only when the same snippet carried both a dollar figure and a
    /// percent, e.g. "$166.264 (70.00% of the initial share price)".
    pub compound_percent: Option<f64>,
    pub date: Option<NaiveDate>,
}

impl ParsedValue {
    pub fn from_dollar(raw: impl Into<String>, dollar: f64) -> Self {
        Self {
            raw: raw.into(),
            dollar: Some(dollar),
            ..Self::default()
        }
    }

    pub fn from_percent(raw: impl Into<String>, percent: f64) -> Self {
        Self {
            raw: raw.into(),
            percent: Some(percent),
            ..Self::default()
        }
    }
}

/// Structural shape of the table row a label/value pair was mined from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPattern {
    TwoColumn,
    ThreeColumnSpacer,
    InlineBold,
    SingleCellColon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelValuePair {
    pub label: String,
    pub value: ParsedValue,
    pub table_index: usize,
    pub row_index: usize,
    pub pattern: RowPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMatch {
    pub field: CanonicalField,
    pub value: ParsedValue,
    /// In [0.5, 1.0]; higher means a more specific pattern matched.
    pub confidence: f64,
    pub source: SourceTier,
    /// The matched table label, or a short pattern identifier for the
    /// regex tiers.
    pub label: String,
}

/// Output aggregate for one document. Immutable after construction;
/// every populated field has exactly one entry in `sources`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedFiling {
    pub initial_price: Option<f64>,
    pub threshold_dollar: Option<f64>,
    pub threshold_pct: Option<f64>,
    pub autocall_level: Option<f64>,
    pub coupon_rate_annual: Option<f64>,
    pub coupon_payment_per_period: Option<f64>,
    pub contingent_payment_pct: Option<f64>,
    pub notional: Option<f64>,
    pub issuer: Option<String>,
    pub underlying: Option<String>,
    pub cusip: Option<String>,
    pub isin: Option<String>,
    pub payment_frequency: Option<String>,
    pub pricing_date: Option<NaiveDate>,
    pub maturity_date: Option<NaiveDate>,
    pub issue_date: Option<NaiveDate>,
    pub sources: BTreeMap<CanonicalField, SourceTier>,
    pub validation_warnings: Vec<String>,
    pub product_terms: ProductTerms,
}
