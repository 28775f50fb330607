pub mod detect;
pub mod parse;

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Read the filing from a file, or stdin when no path was given.
pub(crate) fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read filing: {}", path.display())),
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("failed to read filing from stdin")?;
            Ok(content)
        }
    }
}

/// Cheap sniff for HTML input; `--text` overrides it.
pub(crate) fn looks_like_html(content: &str) -> bool {
    let head: String = content.chars().take(2048).collect();
    let head = head.to_ascii_lowercase();
    head.contains("<html") || head.contains("<!doctype") || head.contains("<table")
}
