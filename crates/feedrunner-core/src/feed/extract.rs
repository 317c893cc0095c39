use scraper::{Html, Selector};

/// Content container candidates, tried in order
const CONTAINER_SELECTORS: &[&str] = &["article", "main", "div.content", "body"];

/// Extract a plain-text content body from an HTML page by locating the first
/// matching content container. Returns None when nothing useful was found.
pub fn extract_content(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for selector_str in CONTAINER_SELECTORS {
        // Selectors here are static and known-valid
        let selector = match Selector::parse(selector_str) {
            Ok(s) => s,
            Err(_) => continue,
        };

        if let Some(element) = document.select(&selector).next() {
            let text: Vec<String> = element
                .text()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string())
                .collect();

            if !text.is_empty() {
                return Some(text.join("\n"));
            }
        }
    }

    None
}
