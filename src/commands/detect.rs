use anyhow::{Context, Result};

use termsheet::issuers::detect_issuer;
use termsheet::text::extract_text_from_html;

use crate::cli::DetectArgs;
use crate::commands::{looks_like_html, read_input};

pub fn run(args: DetectArgs) -> Result<()> {
    let content = read_input(args.input.as_deref())?;
    let text = if !args.text && looks_like_html(&content) {
        extract_text_from_html(&content)
    } else {
        content
    };

    let issuer = detect_issuer(&text).map(|config| config.name);
    let json = serde_json::to_string(&serde_json::json!({ "issuer": issuer }))
        .context("failed to serialize detection result")?;
    println!("{json}");

    Ok(())
}
