use scraper::{Html, Selector};

use crate::utils::error::AppError;

/// Raw, unvalidated DOM text captured from one page load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub name_text: String,
    pub price_text: String,
}

/// Pulls the product name and price text out of a page using ordered
/// selector fallback: the most specific structured markup is tried first,
/// the loosest generic selector last. Site markup varies by product type
/// and membership tier, so a generic selector alone would be too eager and
/// pick up unrelated text.
pub struct PriceExtractor {
    name_selectors: Vec<Selector>,
    price_selectors: Vec<Selector>,
    price_selector_list: String,
}

impl PriceExtractor {
    pub fn new(name_selectors: &[&str], price_selectors: &[&str]) -> Result<Self, AppError> {
        Ok(Self {
            name_selectors: compile(name_selectors)?,
            price_selectors: compile(price_selectors)?,
            price_selector_list: price_selectors.join(", "),
        })
    }

    /// Apply both selector lists to the page HTML, returning the first
    /// non-empty trimmed text per field. Missing fields come back empty.
    pub fn extract(&self, html: &str) -> ExtractedFields {
        let document = Html::parse_document(html);

        ExtractedFields {
            name_text: first_non_empty(&document, &self.name_selectors),
            price_text: first_non_empty(&document, &self.price_selectors),
        }
    }

    /// Comma-joined price selector list, for browser-side waits.
    pub fn price_wait_selector(&self) -> &str {
        &self.price_selector_list
    }
}

fn compile(selectors: &[&str]) -> Result<Vec<Selector>, AppError> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s)
                .map_err(|e| AppError::Validation(format!("Invalid CSS selector '{}': {:?}", s, e)))
        })
        .collect()
}

fn first_non_empty(document: &Html, selectors: &[Selector]) -> String {
    for selector in selectors {
        for element in document.select(selector) {
            let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// A price text is usable when it carries at least one digit and is not a
/// placeholder dash sequence ("--" while the real price lazy-loads, or for
/// member-only items).
pub fn is_valid_price_text(text: &str) -> bool {
    !text.is_empty() && text.chars().any(|c| c.is_ascii_digit()) && !text.contains("--")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_extractor() -> PriceExtractor {
        PriceExtractor::new(
            &["h1[itemprop=\"name\"]", "h1"],
            &[".price-current", ".value"],
        )
        .unwrap()
    }

    #[test]
    fn test_specific_selector_wins() {
        let html = r#"
            <html><body>
                <h1 itemprop="name">Structured Name</h1>
                <h1>Generic Heading</h1>
                <div class="price-current">$19.99</div>
                <div class="value">$999.99</div>
            </body></html>
        "#;

        let fields = test_extractor().extract(html);
        assert_eq!(fields.name_text, "Structured Name");
        assert_eq!(fields.price_text, "$19.99");
    }

    #[test]
    fn test_generic_fallback_used_when_specific_missing() {
        let html = r#"
            <html><body>
                <h1>Only A Generic Heading</h1>
                <div class="value">$42.00</div>
            </body></html>
        "#;

        let fields = test_extractor().extract(html);
        assert_eq!(fields.name_text, "Only A Generic Heading");
        assert_eq!(fields.price_text, "$42.00");
    }

    #[test]
    fn test_empty_specific_match_falls_through() {
        // A present-but-empty element must not shadow a populated fallback.
        let html = r#"
            <html><body>
                <h1 itemprop="name">   </h1>
                <h1>Fallback Name</h1>
            </body></html>
        "#;

        let fields = test_extractor().extract(html);
        assert_eq!(fields.name_text, "Fallback Name");
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let fields = test_extractor().extract("<html><body><p>nothing here</p></body></html>");
        assert_eq!(fields, ExtractedFields::default());
    }

    #[test]
    fn test_nested_text_is_joined_and_trimmed() {
        let html = r#"
            <html><body>
                <div class="price-current">$<span>1,049</span><sup>.99</sup></div>
            </body></html>
        "#;

        let fields = test_extractor().extract(html);
        assert_eq!(fields.price_text, "$ 1,049 .99");
    }

    #[test]
    fn test_price_wait_selector() {
        assert_eq!(
            test_extractor().price_wait_selector(),
            ".price-current, .value"
        );
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        assert!(PriceExtractor::new(&[">>>"], &[".price"]).is_err());
    }

    #[test]
    fn test_price_text_validation() {
        assert!(is_valid_price_text("$19.99"));
        assert!(is_valid_price_text("1049"));

        assert!(!is_valid_price_text(""));
        assert!(!is_valid_price_text("--"));
        assert!(!is_valid_price_text("$--.--"));
        // A digit next to the placeholder still means the price is not ready
        assert!(!is_valid_price_text("$0.--"));
        assert!(!is_valid_price_text("Sign in for price"));
    }
}
