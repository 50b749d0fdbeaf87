use serde::{Deserialize, Serialize};
use std::fmt;
use tantivy::tokenizer::{
    AsciiFoldingFilter, LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream,
};

/// Standard English stop words.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "also", "am", "among", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "cannot", "could", "did", "do", "does", "doing", "down", "during", "each", "either", "else", "ever", "every",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "however", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "least",
    "less", "may", "me", "might", "more", "most", "much", "must", "my", "myself", "neither", "no", "nor", "not",
    "now", "of", "off", "often", "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out",
    "over", "own", "rather", "same", "shall", "she", "should", "since", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those", "though", "through",
    "thus", "to", "too", "under", "until", "up", "upon", "us", "very", "was", "we", "were", "what", "when", "where",
    "whether", "which", "while", "who", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet",
    "you", "your", "yours", "yourself", "yourselves",
];

const MAX_TOKEN_LEN: usize = 40;
const MIN_TOKEN_LEN: usize = 2;

/// Word-boundary tokenizer shared by index build, query vectorization and
/// the keyword matcher: split on non-alphanumerics, drop over-long tokens,
/// lower-case, fold accents, strip stop words, drop 1-char tokens.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "AnalyzerSpec", into = "AnalyzerSpec")]
pub struct Analyzer {
    extra_stop_words: Vec<String>,
    inner: TextAnalyzer,
}

/// Persisted form of an [`Analyzer`].
#[derive(Serialize, Deserialize)]
pub struct AnalyzerSpec {
    pub extra_stop_words: Vec<String>,
}

impl From<AnalyzerSpec> for Analyzer {
    fn from(spec: AnalyzerSpec) -> Self { Analyzer::new(spec.extra_stop_words) }
}

impl From<Analyzer> for AnalyzerSpec {
    fn from(analyzer: Analyzer) -> Self { AnalyzerSpec { extra_stop_words: analyzer.extra_stop_words } }
}

impl Default for Analyzer {
    fn default() -> Self { Analyzer::new(Vec::new()) }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer").field("extra_stop_words", &self.extra_stop_words).finish()
    }
}

impl Analyzer {
    pub fn new(extra_stop_words: Vec<String>) -> Self {
        let extra_stop_words: Vec<String> = extra_stop_words.into_iter().map(|w| w.trim().to_lowercase()).filter(|w| !w.is_empty()).collect();
        let stop_words = ENGLISH_STOP_WORDS.iter().map(|s| s.to_string()).chain(extra_stop_words.iter().cloned());
        let inner = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(AsciiFoldingFilter)
            .filter(StopWordFilter::remove(stop_words))
            .build();
        Self { extra_stop_words, inner }
    }

    /// Tokens of `text` in order, duplicates kept.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.inner.clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            let token = &stream.token().text;
            if token.chars().count() >= MIN_TOKEN_LEN {
                tokens.push(token.clone());
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_lowercases_and_strips_stop_words() {
        let analyzer = Analyzer::default();
        assert_eq!(analyzer.tokenize("The Dell XPS-13 is a laptop"), vec!["dell", "xps", "13", "laptop"]);
    }

    #[test]
    fn folds_accents_and_drops_single_chars() {
        let analyzer = Analyzer::default();
        assert_eq!(analyzer.tokenize("Café x 5 écran"), vec!["cafe", "ecran"]);
    }

    #[test]
    fn only_stop_words_yield_nothing() {
        assert!(Analyzer::default().tokenize("under the and of with").is_empty());
    }

    #[test]
    fn extra_stop_words_apply_and_survive_serde() {
        let analyzer = Analyzer::new(vec!["Buy".into()]);
        assert_eq!(analyzer.tokenize("buy phone"), vec!["phone"]);
        let json = serde_json::to_string(&analyzer).unwrap();
        let back: Analyzer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tokenize("buy phone"), vec!["phone"]);
    }
}
