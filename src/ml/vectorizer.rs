use crate::error::{AppError, Result};
use crate::ml::models::VectorizerConfig;
use ndarray::Array1;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Tokens of two or more word characters
static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Stop words dropped by the vectorizer before n-grams are built
static ENGLISH_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone",
        "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
        "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind",
        "being", "below", "beside", "besides", "between", "beyond", "bill", "both", "bottom",
        "but", "by", "call", "can", "cannot", "cant", "co", "con", "could", "couldnt", "cry",
        "de", "describe", "detail", "do", "done", "down", "due", "during", "each", "eg",
        "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even",
        "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
        "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty",
        "found", "four", "from", "front", "full", "further", "get", "give", "go", "had", "has",
        "hasnt", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein",
        "hereupon", "hers", "herself", "him", "himself", "his", "how", "however", "hundred",
        "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its",
        "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many",
        "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most",
        "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither", "never",
        "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
        "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
        "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
        "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem",
        "seemed", "seeming", "seems", "serious", "several", "she", "should", "show", "side",
        "since", "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something",
        "sometime", "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than",
        "that", "the", "their", "them", "themselves", "then", "thence", "there", "thereafter",
        "thereby", "therefore", "therein", "thereupon", "these", "they", "thick", "thin",
        "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus",
        "to", "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un",
        "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were",
        "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
        "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither",
        "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without",
        "would", "yet", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Sparse feature vector with sorted, unique indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseVector {
    /// Build from unordered `(index, value)` pairs; zero entries are dropped
    pub fn new(dim: usize, mut entries: Vec<(usize, f64)>) -> Self {
        entries.retain(|(_, v)| *v != 0.0);
        entries.sort_by_key(|(i, _)| *i);

        let mut indices: Vec<usize> = Vec::with_capacity(entries.len());
        let mut values: Vec<f64> = Vec::with_capacity(entries.len());
        for (i, v) in entries {
            if indices.last() == Some(&i) {
                if let Some(last) = values.last_mut() {
                    *last += v;
                }
            } else {
                indices.push(i);
                values.push(v);
            }
        }

        Self {
            dim,
            indices,
            values,
        }
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn from_dense(dense: &[f64]) -> Self {
        let entries = dense.iter().copied().enumerate().collect();
        Self::new(dense.len(), entries)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored non-zero entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn squared_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    pub fn to_dense(&self) -> Array1<f64> {
        let mut dense = Array1::zeros(self.dim);
        for (i, v) in self.iter() {
            dense[i] = v;
        }
        dense
    }
}

/// TF-IDF vectorizer over word n-grams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Configuration
    config: VectorizerConfig,

    /// Vocabulary mapping (term -> index)
    vocabulary: HashMap<String, usize>,

    /// Smoothed inverse document frequency, indexed like the vocabulary
    idf: Vec<f64>,

    /// Is fitted (vocabulary frozen)
    is_fitted: bool,
}

impl TfidfVectorizer {
    pub fn new(config: VectorizerConfig) -> Self {
        Self {
            config,
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            is_fitted: false,
        }
    }

    /// Build the vocabulary and IDF weights from a cleaned corpus
    pub fn fit(&mut self, corpus: &[String]) -> Result<()> {
        if corpus.is_empty() {
            return Err(AppError::Training(
                "Cannot fit vectorizer on an empty corpus".to_string(),
            ));
        }

        let documents: Vec<Vec<String>> = corpus.par_iter().map(|doc| self.analyze(doc)).collect();

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for terms in &documents {
            let mut seen: HashSet<&str> = HashSet::new();
            for term in terms {
                *term_freq.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        if term_freq.is_empty() {
            return Err(AppError::Training(
                "Empty vocabulary; documents may only contain stop words".to_string(),
            ));
        }

        // Most frequent terms first, ties alphabetical
        let mut ranked: Vec<(&str, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.config.max_features);

        let mut kept: Vec<&str> = ranked.into_iter().map(|(term, _)| term).collect();
        kept.sort_unstable();

        let n_docs = corpus.len() as f64;
        self.idf = kept
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        self.vocabulary = kept
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term.to_string(), idx))
            .collect();
        self.is_fitted = true;

        tracing::debug!(
            vocabulary_size = self.vocabulary.len(),
            documents = corpus.len(),
            "TF-IDF vocabulary fitted"
        );

        Ok(())
    }

    /// Fit on the corpus and return its vectors
    pub fn fit_transform(&mut self, corpus: &[String]) -> Result<Vec<SparseVector>> {
        self.fit(corpus)?;
        Ok(corpus.par_iter().map(|doc| self.vectorize(doc)).collect())
    }

    /// Vectorize one cleaned text against the frozen vocabulary
    pub fn transform(&self, text: &str) -> Result<SparseVector> {
        if !self.is_fitted {
            return Err(AppError::Internal(
                "TfidfVectorizer must be fitted before transform".to_string(),
            ));
        }
        Ok(self.vectorize(text))
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    /// Index of a term, if it survived vocabulary selection
    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    fn vectorize(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in self.analyze(text) {
            // Out-of-vocabulary terms carry no weight
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();
        entries.sort_unstable_by_key(|(idx, _)| *idx);

        let norm =entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in entries.iter_mut() {
                *v /= norm;
            }
        }

        SparseVector::new(self.vocabulary.len(), entries)
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        TOKEN
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|token| !(self.config.english_stop_words && ENGLISH_STOP_WORDS.contains(token)))
            .map(str::to_string)
            .collect()
    }

    /// Tokens expanded into every n-gram in the configured range
    fn analyze(&self, text: &str) -> Vec<String> {
        let tokens = self.tokenize(text);
        let (min_n, max_n) = self.config.ngram_range;
        let min_n = min_n.max(1);

        let mut terms = Vec::new();
        for n in min_n..=max_n {
            if n == 1 {
                terms.extend(tokens.iter().cloned());
            } else {
                terms.extend(tokens.windows(n).map(|w| w.join(" ")));
            }
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "aliens landed new york city demanding pizza".to_string(),
            "stock market steady growth technology sector".to_string(),
            "city council approves budget public transportation".to_string(),
        ]
    }

    #[test]
    fn test_sparse_vector_sorts_and_merges_entries() {
        let a = SparseVector::new(5, vec![(3, 2.0), (0, 1.0), (2, 0.0)]);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![(0, 1.0), (3, 2.0)]);
        assert_eq!(a.to_dense().to_vec(), vec![1.0, 0.0, 0.0, 2.0, 0.0]);
        assert_eq!(a.squared_norm(), 5.0);
        let merged = SparseVector::new(3, vec![(1, 1.0), (1, 0.5)]);
        assert_eq!(merged.iter().collect::<Vec<_>>(), vec![(1, 1.5)]);
        assert_eq!(a.nnz(), 2);
        assert_eq!(SparseVector::from_dense(&[0.0, 1.0, 0.0]).nnz(), 1);
    }

    #[test]
    fn test_fit_builds_unigrams_and_bigrams() {
        let mut vectorizer = TfidfVectorizer::new(VectorizerConfig::default());
        vectorizer.fit(&corpus()).unwrap();

        assert!(vectorizer.is_fitted());
        assert!(vectorizer.term_index("pizza").is_some());
        assert!(vectorizer.term_index("york city").is_some());
        assert!(vectorizer.term_index("new").is_some());
    }

    #[test]
    fn test_vocabulary_is_alphabetical_and_capped() {
        let config = VectorizerConfig {
            max_features: 4,
            ..VectorizerConfig::default()
        };
        let mut vectorizer = TfidfVectorizer::new(config);
        vectorizer.fit(&corpus()).unwrap();

        assert_eq!(vectorizer.vocabulary_size(), 4);
        // "city" appears twice and always survives the cut
        let city = vectorizer.term_index("city").unwrap();
        assert!(city < 4);
    }

    #[test]
    fn test_transform_is_l2_normalized() {
        let mut vectorizer = TfidfVectorizer::new(VectorizerConfig::default());
        let vectors = vectorizer.fit_transform(&corpus()).unwrap();

        for v in &vectors {
            assert!((v.squared_norm() - 1.0).abs() < 1e-9);
            assert_eq!(v.dim(), vectorizer.vocabulary_size());
        }
    }

    #[test]
    fn test_unknown_terms_are_ignored() {
        let mut vectorizer = TfidfVectorizer::new(VectorizerConfig::default());
        vectorizer.fit(&corpus()).unwrap();

        let v = vectorizer.transform("completely unseen words").unwrap();
        assert_eq!(v.nnz(), 0);
        assert_eq!(v.squared_norm(), 0.0);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let vectorizer = TfidfVectorizer::new(VectorizerConfig::default());
        assert!(vectorizer.transform("pizza").is_err());
    }

    #[test]
    fn test_fit_rejects_stop_word_only_corpus() {
        let mut vectorizer = TfidfVectorizer::new(VectorizerConfig::default());
        assert!(vectorizer.fit(&[]).is_err());
        assert!(vectorizer.fit(&["the and of".to_string()]).is_err());
    }
}
