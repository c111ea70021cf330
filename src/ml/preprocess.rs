use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Anything that is not an ASCII letter or whitespace
static NON_ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z\s]").unwrap());

/// English stopword list applied before vectorization
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
        "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his",
        "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself",
        "they", "them", "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
        "that", "that'll", "these", "those", "am", "is", "are", "was", "were", "be", "been",
        "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
        "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
        "with", "about", "against", "between", "into", "through", "during", "before", "after",
        "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
        "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
        "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
        "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can",
        "will", "just", "don", "don't", "should", "should've", "now", "d", "ll", "m", "o", "re",
        "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn", "didn't", "doesn",
        "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma",
        "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
        "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
        "wouldn't",
    ]
    .into_iter()
    .collect()
});

/// Text normalization applied to every article before vectorization
pub struct TextPreprocessor;

impl TextPreprocessor {
    /// Lowercase, strip non-letters, drop stopwords and rejoin with single spaces
    pub fn preprocess(text: &str) -> String {
        let lowered = text.to_lowercase();
        let letters_only = NON_ALPHA.replace_all(&lowered, "");

        letters_only
            .split_whitespace()
            .filter(|token| !Self::is_stopword(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Missing text cleans to the empty string
    pub fn preprocess_opt(text: Option<&str>) -> String {
        text.map(Self::preprocess).unwrap_or_default()
    }

    pub fn is_stopword(token: &str) -> bool {
        STOPWORDS.contains(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_digits_and_punctuation() {
        let cleaned = TextPreprocessor::preprocess("Vote 4 Bob!!");
        assert_eq!(cleaned, "vote bob");
        assert!(!cleaned.chars().any(|c| c.is_ascii_digit() || c.is_ascii_punctuation()));
    }

    #[test]
    fn test_removes_stopwords() {
        let cleaned = TextPreprocessor::preprocess("The quick brown fox jumps over the lazy dog");
        assert_eq!(cleaned, "quick brown fox jumps lazy dog");
    }

    #[test]
    fn test_idempotent_on_clean_text() {
        let once = TextPreprocessor::preprocess("Breaking: Aliens have landed in New York City!");
        let twice = TextPreprocessor::preprocess(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(
            TextPreprocessor::preprocess("  stock\tmarket \n\n growth  "),
            "stock market growth"
        );
    }

    #[test]
    fn test_non_latin_and_missing_text() {
        assert_eq!(TextPreprocessor::preprocess("日本語 123 ???"), "");
        assert_eq!(TextPreprocessor::preprocess_opt(None), "");
        assert_eq!(TextPreprocessor::preprocess_opt(Some("Pizza!")), "pizza");
    }

    #[test]
    fn test_contractions_lose_apostrophe_before_filtering() {
        // "don't" becomes "dont", which is not on the list
        assert_eq!(TextPreprocessor::preprocess("I don't know"), "dont know");
    }
}
