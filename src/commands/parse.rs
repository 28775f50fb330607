use anyhow::{Context, Result};
use tracing::info;

use termsheet::pipeline::{parse_filing_with, ParseOptions};

use crate::cli::ParseArgs;
use crate::commands::{looks_like_html, read_input};

pub fn run(args: ParseArgs) -> Result<()> {
    let content = read_input(args.input.as_deref())?;
    let is_html = !args.text && looks_like_html(&content);

    let options = ParseOptions {
        assumed_payments_per_year: args.payments_per_year,
    };
    let filing = parse_filing_with(&content, is_html, args.issuer.as_deref(), &options);

    info!(
        is_html,
        fields = filing.sources.len(),
        warnings = filing.validation_warnings.len(),
        "parse completed"
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&filing)
    } else {
        serde_json::to_string(&filing)
    }
    .context("failed to serialize parsed filing")?;
    println!("{json}");

    Ok(())
}
