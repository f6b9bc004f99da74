use std::collections::HashSet;

/// Common English function words dropped during normalization.
/// Words the extractor matches on (`is`, `than`, `with`, `by`) are not listed.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "i", "my", "myself", "we", "our", "ours", "you", "your", "yours", "he",
    "him", "she", "they", "them", "its", "itself", "please", "could", "would", "should", "can",
    "will", "shall", "may", "might", "must", "do", "does", "did", "doing", "be", "been", "being",
    "was", "were", "am", "are", "for", "on", "about", "into", "through", "during", "before",
    "after", "again", "further", "then", "once", "here", "there", "just", "so", "very", "too",
    "also", "that", "these", "those", "such", "own", "only", "some", "any", "both", "if", "or",
    "because", "as", "until", "while", "whom", "why", "yourself", "ourselves", "themselves",
    "hers", "herself", "himself", "theirs", "had", "nor", "same", "other", "out", "off", "down",
    "now", "don", "kindly",
];

/// Plural-looking words that keep their trailing `s`
const PROTECTED_WORDS: &[&str] = &[
    "sales", "orders", "items", "times", "status", "customers", "products", "analytics", "series",
    "news", "days", "months", "years", "weeks", "quarters", "less", "unless", "always", "has",
    "was", "is", "this", "its", "plus", "minus", "bonus", "address", "process",
];

/// Text normalization collaborator: lowercase, punctuation stripping,
/// stopword filtering and light plural lemmatization.
pub struct TextPreprocessor {
    stopwords: HashSet<&'static str>,
}

impl Default for TextPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextPreprocessor {
    pub fn new() -> Self {
        Self {
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    /// Normalize `text`. Words in `protected` (schema vocabulary) are never lemmatized.
    pub fn clean_text(&self, text: &str, protected: &HashSet<String>) -> String {
        let lowered = text.to_lowercase();
        let stripped = strip_punctuation(&lowered);

        stripped
            .split_whitespace()
            .filter(|token| !self.stopwords.contains(token))
            .map(|token| lemmatize(token, protected))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Keep word characters, whitespace and `< > = !`; keep `-` and `.` between digits
fn strip_punctuation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &ch) in chars.iter().enumerate() {
        let keep = ch.is_alphanumeric()
            || ch == '_'
            || ch.is_whitespace()
            || matches!(ch, '<' | '>' | '=' | '!')
            || (matches!(ch, '-' | '.')
                && i > 0
                && chars[i - 1].is_ascii_digit()
                && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()));
        out.push(if keep { ch } else { ' ' });
    }

    out
}

/// Singular form of `token`. Schema words are kept as written; a domain word
/// is kept unless its singular is what the schema declares.
fn lemmatize(token: &str, protected: &HashSet<String>) -> String {
    if protected.contains(token) {
        return token.to_string();
    }
    match singular(token) {
        Some(stem) if !PROTECTED_WORDS.contains(&token) || protected.contains(&stem) => stem,
        _ => token.to_string(),
    }
}

fn singular(token: &str) -> Option<String> {
    if token.len() <= 3 || !token.chars().all(|c| c.is_alphabetic()) {
        return None;
    }
    if token.ends_with("ss") || token.ends_with("us") || token.ends_with("is") {
        return None;
    }
    if let Some(stem) = token.strip_suffix("ies") {
        return Some(format!("{}y", stem));
    }
    for suffix in ["ches", "shes", "xes", "sses"] {
        if token.ends_with(suffix) {
            return Some(token[..token.len() - 2].to_string());
        }
    }
    token.strip_suffix('s').map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(text: &str) -> String {
        TextPreprocessor::new().clean_text(text, &HashSet::new())
    }

    #[test]
    fn test_lowercase_and_punctuation() {
        assert_eq!(clean("Show me the Customers!"), "show me customers!");
        assert_eq!(clean("price >= 10, please"), "price >= 10");
        assert_eq!(clean("What's the total?"), "what s total");
    }

    #[test]
    fn test_dates_and_decimals_survive() {
        assert_eq!(
            clean("orders between 2023-01-01 and 2023-03-31"),
            "orders between 2023-01-01 and 2023-03-31"
        );
        assert_eq!(clean("price above 19.99."), "price above 19.99");
        assert_eq!(clean("well-known"), "well known");
    }

    #[test]
    fn test_query_words_are_retained() {
        assert_eq!(
            clean("orders with total amount greater than 150"),
            "orders with total amount greater than 150"
        );
        assert_eq!(clean("how many orders are there"), "how many orders");
        assert_eq!(clean("where status is pending"), "where status is pending");
    }

    #[test]
    fn test_lemmatization() {
        assert_eq!(clean("categories"), "category");
        assert_eq!(clean("boxes"), "box");
        assert_eq!(clean("regions"), "region");
        assert_eq!(clean("address"), "address");
        assert_eq!(clean("total sales"), "total sales");
    }

    #[test]
    fn test_schema_vocabulary_is_protected() {
        let protected: HashSet<String> = ["suppliers".to_string()].into_iter().collect();
        let cleaned = TextPreprocessor::new().clean_text("list suppliers and regions", &protected);
        assert_eq!(cleaned, "list suppliers and region");
    }

    #[test]
    fn test_domain_plurals_follow_singular_schema_names() {
        let singular: HashSet<String> = ["customer", "product", "id", "name"]
            .iter()
            .map(|w| w.to_string())
            .collect();
        let cleaned = TextPreprocessor::new().clean_text("show customers and products with orders", &singular);
        assert_eq!(cleaned, "show customer and product with orders");

        let plural: HashSet<String> = ["customers".to_string()].into_iter().collect();
        assert_eq!(
            TextPreprocessor::new().clean_text("show customers", &plural),
            "show customers"
        );
    }
}
