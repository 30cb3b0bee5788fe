use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into",
            "is", "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then",
            "there", "these", "they", "this", "to", "was", "will", "with",
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Stage toggles. Every stage is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// NFKC-normalize before tokenizing.
    pub normalize_unicode: bool,
    /// Split on non-alphanumeric boundaries; when off, split on whitespace only.
    pub split_non_alphanumeric: bool,
    pub lowercase: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
            split_non_alphanumeric: true,
            lowercase: true,
            remove_stopwords: true,
            stem: true,
        }
    }
}

/// Text normalization shared by indexing and querying.
///
/// Holds only its stage toggles; the regex, stemmer and stop set are immutable
/// statics, so one value can be copied into any number of worker threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> AnalyzerConfig {
        self.config
    }

    /// Turn `text` into its ordered sequence of index terms.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let cfg = &self.config;
        let normalized: String = if cfg.normalize_unicode { text.nfkc().collect() } else { text.to_string() };

        let raw: Box<dyn Iterator<Item = &str> + '_> = if cfg.split_non_alphanumeric {
            Box::new(RE.find_iter(&normalized).map(|m| m.as_str()))
        } else {
            Box::new(normalized.split_whitespace())
        };

        let mut tokens = Vec::new();
        for token in raw {
            let token = if cfg.lowercase { token.to_lowercase() } else { token.to_string() };
            if cfg.remove_stopwords && is_stopword(&token) {
                continue;
            }
            if cfg.stem {
                tokens.push(STEMMER.stem(&token).into_owned());
            } else {
                tokens.push(token);
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> AnalyzerConfig {
        AnalyzerConfig {
            normalize_unicode: false,
            split_non_alphanumeric: true,
            lowercase: false,
            remove_stopwords: false,
            stem: false,
        }
    }

    #[test]
    fn full_pipeline_lowercases_filters_and_stems() {
        let terms = Analyzer::default().analyze("The Running dogs of the Wing");
        assert_eq!(terms, vec!["run", "dog", "wing"]);
    }

    #[test]
    fn splits_on_punctuation() {
        let terms = Analyzer::new(plain()).analyze("data+structures, boundary-layer");
        assert_eq!(terms, vec!["data", "structures", "boundary", "layer"]);
    }

    #[test]
    fn whitespace_split_keeps_punctuation() {
        let cfg = AnalyzerConfig { split_non_alphanumeric: false, ..plain() };
        let terms = Analyzer::new(cfg).analyze("data+structures  flow");
        assert_eq!(terms, vec!["data+structures", "flow"]);
    }

    #[test]
    fn stopwords_are_matched_after_lowercasing() {
        let cfg = AnalyzerConfig { remove_stopwords: true, ..plain() };
        // Without lowercasing "The" is not in the stop set.
        assert_eq!(Analyzer::new(cfg).analyze("The the flow"), vec!["The", "flow"]);
        let cfg = AnalyzerConfig { lowercase: true, ..cfg };
        assert_eq!(Analyzer::new(cfg).analyze("The the flow"), vec!["flow"]);
    }

    #[test]
    fn output_is_stable_across_calls() {
        let analyzer = Analyzer::default();
        let text = "Experimental investigation of the aerodynamics of a wing in a slipstream.";
        assert_eq!(analyzer.analyze(text), analyzer.analyze(text));
    }

    #[test]
    fn empty_text_has_no_terms() {
        assert!(Analyzer::default().analyze("  ... ").is_empty());
    }
}
