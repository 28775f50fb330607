use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::model::{LabelValuePair, RowPattern};
use crate::value::parse_value;

/// Label-value rows are narrow; anything wider is a data table.
const MAX_LABEL_VALUE_CELLS: usize = 4;
/// Labels longer than this are almost certainly paragraph text.
const MAX_LABEL_CHARS: usize = 120;
/// How many leading rows the skip heuristic samples.
const SKIP_SAMPLE_ROWS: usize = 3;
/// A table must yield at least this many pairs to count as "valid" when an
/// issuer config asks the scan to stop at the first valid table.
const STOP_MIN_PAIRS: usize = 3;

// Term sheets routinely include illustrative example tables carrying the
// same field vocabulary as the authoritative terms; accepting the first
// match from one of those produces wrong values.
static SKIP_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)example|hypothetical|illustrative|for\s+illustration|scenario|assumed|historical|past\s+performance|quarterly\s+(?:high|low|close)",
    )
    .expect("skip table regex")
});

static VALUE_ONLY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\s$]*[0-9,]+(?:\.[0-9]+)?\s*[%$]?\s*$").expect("value-only regex")
});

static FOOTNOTE_MARK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[*\u{2020}\u{2021}\u{00a7}\u{00b6}]+").expect("footnote regex"));

/// Scan every `<table>` in `html` and mine label/value rows, skipping
/// tables that look like example, hypothetical, or historical data.
///
/// With `stop_after_first_valid` set, scanning ends after the first table
/// that yields at least `STOP_MIN_PAIRS` pairs; some issuers front-load
/// the authoritative terms table and repeat its vocabulary later in
/// hypothetical payout sections the skip heuristic cannot always catch.
pub fn extract_label_value_pairs(html: &str, stop_after_first_valid: bool) -> Vec<LabelValuePair> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table").expect("table selector");
    let row_selector = Selector::parse("tr").expect("row selector");
    let cell_selector = Selector::parse("td, th").expect("cell selector");
    let bold_selector = Selector::parse("b, strong").expect("bold selector");

    let mut pairs: Vec<LabelValuePair> = Vec::new();

    for (table_index, table) in document.select(&table_selector).enumerate() {
        let rows: Vec<Vec<ElementRef>> = table
            .select(&row_selector)
            .map(|row| row.select(&cell_selector).collect::<Vec<_>>())
            .filter(|cells| !cells.is_empty())
            .collect();
        if rows.is_empty() {
            continue;
        }

        let text_rows: Vec<Vec<String>> = rows
            .iter()
            .map(|cells| cells.iter().map(cell_text).collect())
            .collect();
        if should_skip_table(&text_rows) {
            debug!(table_index, "skipping example/hypothetical table");
            continue;
        }

        let before = pairs.len();
        for (row_index, cells) in rows.iter().enumerate() {
            let texts = &text_rows[row_index];
            if texts.len() > MAX_LABEL_VALUE_CELLS {
                continue;
            }
            if texts.iter().all(|text| text.is_empty()) {
                continue;
            }

            // Two cells: label on the left, value on the right.
            if texts.len() == 2 {
                let (label, value_text) = (&texts[0], &texts[1]);
                if !label.is_empty() && !value_text.is_empty() && looks_like_label(label) {
                    pairs.push(make_pair(
                        label,
                        value_text,
                        table_index,
                        row_index,
                        RowPattern::TwoColumn,
                    ));
                    continue;
                }
            }

            // Three cells with an empty spacer in the middle; when the
            // middle is non-empty, some layouts split the label across the
            // first two cells.
            if texts.len() == 3 {
                let (label, spacer, value_text) = (&texts[0], &texts[1], &texts[2]);
                if !label.is_empty()
                    && spacer.is_empty()
                    && !value_text.is_empty()
                    && looks_like_label(label)
                {
                    pairs.push(make_pair(
                        label,
                        value_text,
                        table_index,
                        row_index,
                        RowPattern::ThreeColumnSpacer,
                    ));
                    continue;
                }
                if !label.is_empty() && !spacer.is_empty() && !value_text.is_empty() {
                    let combined = format!("{label} {spacer}");
                    if looks_like_label(&combined) {
                        pairs.push(make_pair(
                            &combined,
                            value_text,
                            table_index,
                            row_index,
                            RowPattern::ThreeColumnSpacer,
                        ));
                        continue;
                    }
                }
            }

            // A bold/strong run at the head of a cell acting as the label,
            // with the value inline after it.
            if let Some(pair) =
                inline_bold_pair(cells, &bold_selector, table_index, row_index)
            {
                pairs.push(pair);
                continue;
            }

            // Single cell holding "Label: value".
            if texts.len() == 1 {
                if let Some((left, right)) = texts[0].split_once(':') {
                    let label = left.trim();
                    let value_text = right.trim();
                    if !value_text.is_empty() && looks_like_label(label) {
                        pairs.push(make_pair(
                            label,
                            value_text,
                            table_index,
                            row_index,
                            RowPattern::SingleCellColon,
                        ));
                    }
                }
            }
        }

        let yielded = pairs.len() - before;
        if stop_after_first_valid && yielded >= STOP_MIN_PAIRS {
            debug!(table_index, pairs = yielded, "stopping after first valid table");
            break;
        }
    }

    debug!(pairs = pairs.len(), "table key-value extraction complete");
    pairs
}

fn inline_bold_pair(
    cells: &[ElementRef],
    bold_selector: &Selector,
    table_index: usize,
    row_index: usize,
) -> Option<LabelValuePair> {
    for cell in cells {
        let Some(bold) = cell.select(bold_selector).next() else {
            continue;
        };
        let bold_text = collapse(bold.text());
        let full_text = cell_text(cell);
        // The bold run must open the cell; otherwise this is emphasis
        // inside prose, not a label.
        let Some(remainder) = full_text.strip_prefix(bold_text.as_str()) else {
            continue;
        };
        let value_text = remainder.trim_start().trim_start_matches(':').trim();
        if !bold_text.is_empty() && !value_text.is_empty() && looks_like_label(&bold_text) {
            return Some(make_pair(
                &bold_text,
                value_text,
                table_index,
                row_index,
                RowPattern::InlineBold,
            ));
        }
    }
    None
}

fn make_pair(
    label: &str,
    value_text: &str,
    table_index: usize,
    row_index: usize,
    pattern: RowPattern,
) -> LabelValuePair {
    LabelValuePair {
        label: clean_label(label),
        value: parse_value(value_text),
        table_index,
        row_index,
        pattern,
    }
}

fn should_skip_table(text_rows: &[Vec<String>]) -> bool {
    let sample = text_rows
        .iter()
        .take(SKIP_SAMPLE_ROWS)
        .flat_map(|row| row.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");
    SKIP_TABLE_RE.is_match(&sample)
}

fn cell_text(cell: &ElementRef) -> String {
    collapse(cell.text())
}

fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip footnote marks, trailing colons, and redundant whitespace before
/// the label reaches the matcher.
pub(crate) fn clean_label(label: &str) -> String {
    let stripped = FOOTNOTE_MARK_RE.replace_all(label, "");
    let stripped = stripped
        .trim()
        .trim_end_matches(|c: char| c == ':' || c.is_whitespace());
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Does this cell text read as a label rather than a value?
pub(crate) fn looks_like_label(text: &str) -> bool {
    let text = text.trim().trim_end_matches(':').trim_end();
    if text.is_empty() {
        return false;
    }
    if text.chars().count() > MAX_LABEL_CHARS {
        return false;
    }
    // Pure numbers, dollar amounts, and percentages are values.
    if VALUE_ONLY_RE.is_match(text) {
        return false;
    }
    if text.chars().count() <= 1 {
        return false;
    }
    true
}
