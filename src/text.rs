use scraper::{Html, Node};
use tracing::debug;

/// Flatten an HTML document to plain text for the regex tiers. Script and
/// style content is dropped; all other text nodes are joined with single
/// spaces and runs of whitespace collapse.
pub fn extract_text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut chunks: Vec<&str> = Vec::new();

    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => matches!(element.name(), "script" | "style"),
            _ => false,
        });
        if skipped {
            continue;
        }
        chunks.extend(text.split_whitespace());
    }

    let out = chunks.join(" ");
    debug!(input_chars = html.len(), output_chars = out.len(), "normalized html to text");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_across_elements() {
        let html = "<html><body><h1>Initial price</h1><p>$237.52</p></body></html>";
        assert_eq!(extract_text_from_html(html), "Initial price $237.52");
    }

    #[test]
    fn drops_script_and_style_content() {
        let html = "<html><head><style>td { color: red }</style></head>\
                    <body><script>var x = 1;</script><p>kept</p></body></html>";
        assert_eq!(extract_text_from_html(html), "kept");
    }

    #[test]
    fn collapses_whitespace() {
        let html = "<p>Downside   threshold\n\tlevel</p>";
        assert_eq!(extract_text_from_html(html), "Downside threshold level");
    }
}
