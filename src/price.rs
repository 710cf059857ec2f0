use once_cell::sync::Lazy;
use regex::Regex;

static PRICE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\d,]+\.?\d*").expect("Invalid price regex"));

/// Convert free-form currency text into a numeric value.
///
/// Strips everything that is not a digit, period or comma, takes the first
/// integer-or-decimal run, removes grouping commas and parses the rest as a
/// float. Returns `None` for empty input or text with no numeric run.
pub fn parse_price(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let run = PRICE_RUN.find(&cleaned)?;
    run.as_str().replace(',', "").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("$19.99", Some(19.99))]
    #[case("$1,234.56", Some(1234.56))]
    #[case("Your Price $1,299.99", Some(1299.99))]
    #[case("24.99", Some(24.99))]
    #[case("$120.", Some(120.0))]
    #[case("CAD 2,049.00 each", Some(2049.0))]
    #[case("", None)]
    #[case("--", None)]
    #[case("$ --.--", None)]
    #[case("price unavailable", None)]
    fn test_parse_price(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_price(input), expected);
    }

    #[test]
    fn test_parse_price_takes_first_run() {
        // "Was $99.99, now $79.99" -> the first numeric run wins
        assert_eq!(parse_price("Was $99.99, now $79.99"), Some(99.99));
    }

    #[test]
    fn test_parse_price_bare_separators() {
        assert_eq!(parse_price(",,,"), None);
        assert_eq!(parse_price("..."), None);
    }
}
