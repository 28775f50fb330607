//! Extraction of structured-note economic terms (initial price, downside
//! threshold, autocall level, coupon, notional) from EDGAR term sheets.
//!
//! Three extraction tiers run over each document: HTML table label/value
//! mining, issuer-specific regex patterns, and generic regex fallbacks.
//! A first-tier-wins merge produces one [`model::ParsedFiling`] per
//! document, with derived fields, per-field provenance, and advisory
//! cross-validation warnings.

pub mod dates;
pub mod generic;
pub mod identifiers;
pub mod issuers;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod tables;
pub mod terms;
pub mod text;
pub mod validate;
pub mod value;

pub use model::{
    CanonicalField, FieldMatch, LabelValuePair, ParsedFiling, ParsedValue, RowPattern, SourceTier,
};
pub use pipeline::{parse_filing, parse_filing_with, ParseOptions};
