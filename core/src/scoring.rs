//! Ranking functions.
//!
//! Every model scores one (term, document, field) triple from statistics alone;
//! the query engine multiplies the result by the field boost and sums over
//! matched terms and fields.
//!
//! | model | contribution |
//! |---|---|
//! | classic | √tf · (1 + ln(N / (df + 1)))² / √len |
//! | bm25 | idf · tf·(k1 + 1) / (tf + k1·(1 − b + b·len/avglen)) |
//! | boolean | 1 when the term occurs |
//! | lm-dirichlet | ln(1 + tf / (μ·P(t|C))) + ln(μ / (len + μ)) |
//! | lm-jelinek-mercer | ln((1 − λ)·tf/len + λ·P(t|C)) |

use crate::error::{IrError, Result};
use crate::index::FieldStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const BM25_K1: f64 = 1.2;
pub const BM25_B: f64 = 0.75;
pub const DIRICHLET_MU: f64 = 2000.0;
pub const JELINEK_MERCER_LAMBDA: f64 = 0.7;

/// Statistics of one term within one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStats {
    pub doc_freq: u32,
    pub collection_freq: u64,
}

/// The ranking function, resolved once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ScoringModel {
    Classic,
    Bm25 { k1: f64, b: f64 },
    Boolean,
    LmDirichlet { mu: f64 },
    LmJelinekMercer { lambda: f64 },
}

impl Default for ScoringModel {
    fn default() -> Self {
        ScoringModel::bm25()
    }
}

impl ScoringModel {
    pub fn bm25() -> Self {
        ScoringModel::Bm25 { k1: BM25_K1, b: BM25_B }
    }

    pub fn lm_dirichlet() -> Self {
        ScoringModel::LmDirichlet { mu: DIRICHLET_MU }
    }

    pub fn lm_jelinek_mercer() -> Self {
        ScoringModel::LmJelinekMercer { lambda: JELINEK_MERCER_LAMBDA }
    }

    /// Legacy integer switch: 0 classic, 1 bm25, 2 boolean, 3 dirichlet, 4 jelinek-mercer.
    pub fn from_selector(selector: u8) -> Result<Self> {
        match selector {
            0 => Ok(ScoringModel::Classic),
            1 => Ok(ScoringModel::bm25()),
            2 => Ok(ScoringModel::Boolean),
            3 => Ok(ScoringModel::lm_dirichlet()),
            4 => Ok(ScoringModel::lm_jelinek_mercer()),
            other => Err(IrError::config(format!("unknown score model selector {other}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScoringModel::Classic => "classic",
            ScoringModel::Bm25 { .. } => "bm25",
            ScoringModel::Boolean => "boolean",
            ScoringModel::LmDirichlet { .. } => "lm-dirichlet",
            ScoringModel::LmJelinekMercer { .. } => "lm-jelinek-mercer",
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            ScoringModel::Bm25 { k1, b } => k1.is_finite() && k1 >= 0.0 && (0.0..=1.0).contains(&b),
            ScoringModel::LmDirichlet { mu } => mu.is_finite() && mu > 0.0,
            ScoringModel::LmJelinekMercer { lambda } => lambda > 0.0 && lambda < 1.0,
            ScoringModel::Classic | ScoringModel::Boolean => true,
        };
        if ok {
            Ok(())
        } else {
            Err(IrError::config(format!("invalid parameters for {self}")))
        }
    }

    /// Contribution of a term occurring `tf` times in a document of `doc_len`
    /// terms, before the field boost is applied.
    pub fn score(&self, tf: u32, term: TermStats, field: &FieldStats, doc_len: u32) -> f64 {
        if tf == 0 {
            return 0.0;
        }
        let tf = tf as f64;
        let len = doc_len as f64;
        match *self {
            ScoringModel::Classic => {
                if doc_len == 0 {
                    return 0.0;
                }
                let idf = classic_idf(field.document_count, term.doc_freq);
                tf.sqrt() * idf * idf / len.sqrt()
            }
            ScoringModel::Bm25 { k1, b } => {
                let idf = bm25_idf(field.document_count, term.doc_freq);
                let avg = field.average_field_length;
                let norm = if avg > 0.0 { len / avg } else { 0.0 };
                idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * norm))
            }
            ScoringModel::Boolean => 1.0,
            ScoringModel::LmDirichlet { mu } => {
                let p = collection_probability(term, field);
                (1.0 + tf / (mu * p)).ln() + (mu / (len + mu)).ln()
            }
            ScoringModel::LmJelinekMercer { lambda } => {
                if doc_len == 0 {
                    return 0.0;
                }
                let p = collection_probability(term, field);
                ((1.0 - lambda) * tf / len + lambda * p).ln()
            }
        }
    }
}

impl fmt::Display for ScoringModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringModel::Bm25 { k1, b } => write!(f, "bm25(k1={k1}, b={b})"),
            ScoringModel::LmDirichlet { mu } => write!(f, "lm-dirichlet(mu={mu})"),
            ScoringModel::LmJelinekMercer { lambda } => write!(f, "lm-jelinek-mercer(lambda={lambda})"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for ScoringModel {
    type Err = IrError;

    /// Accepts a model name with default parameters, or the integer selector.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if let Ok(selector) = s.parse::<u8>() {
            return ScoringModel::from_selector(selector);
        }
        match s.as_str() {
            "classic" | "tfidf" | "tf-idf" | "vsm" => Ok(ScoringModel::Classic),
            "bm25" => Ok(ScoringModel::bm25()),
            "boolean" | "bool" => Ok(ScoringModel::Boolean),
            "lmd" | "lm-dirichlet" | "dirichlet" => Ok(ScoringModel::lm_dirichlet()),
            "lmjm" | "lm-jelinek-mercer" | "jelinek-mercer" => Ok(ScoringModel::lm_jelinek_mercer()),
            other => Err(IrError::config(format!("unknown score model '{other}'"))),
        }
    }
}

/// `1 + ln(N / (df + 1))`
pub fn classic_idf(n: u32, df: u32) -> f64 {
    1.0 + (n as f64 / (df as f64 + 1.0)).ln()
}

/// `ln(1 + (N - df + 0.5) / (df + 0.5))`, never negative.
pub fn bm25_idf(n: u32, df: u32) -> f64 {
    let n = n as f64;
    let df = df as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

fn collection_probability(term: TermStats, field: &FieldStats) -> f64 {
    if field.total_term_occurrences == 0 {
        return 0.0;
    }
    term.collection_freq as f64 / field.total_term_occurrences as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn field(n: u32, avg: f64, total: u64) -> FieldStats {
        FieldStats { document_count: n, average_field_length: avg, total_term_occurrences: total }
    }

    fn term(df: u32, cf: u64) -> TermStats {
        TermStats { doc_freq: df, collection_freq: cf }
    }

    #[test]
    fn classic_matches_hand_computation() {
        // N = 10, df = 4, tf = 4, len = 16
        let idf = 1.0 + (10.0f64 / 5.0).ln();
        let expected = 2.0 * idf * idf / 4.0;
        let got = ScoringModel::Classic.score(4, term(4, 9), &field(10, 8.0, 80), 16);
        assert!((got - expected).abs() < EPS);
    }

    #[test]
    fn classic_prefers_higher_frequency_at_equal_df() {
        // "cat dog" vs "dog dog cat", query "dog"
        let f = field(2, 2.5, 5);
        let t = term(2, 3);
        let doc1 = ScoringModel::Classic.score(1, t, &f, 2);
        let doc2 = ScoringModel::Classic.score(2, t, &f, 3);
        assert!(doc2 > doc1);
    }

    #[test]
    fn bm25_matches_hand_computation() {
        let (k1, b) = (1.2, 0.75);
        let idf = (1.0 + (10.0 - 3.0 + 0.5) / (3.0 + 0.5f64)).ln();
        let expected = idf * (2.0 * (k1 + 1.0)) / (2.0 + k1 * (1.0 - b + b * 12.0 / 8.0));
        let got = ScoringModel::bm25().score(2, term(3, 5), &field(10, 8.0, 80), 12);
        assert!((got - expected).abs() < EPS);
    }

    #[test]
    fn bm25_is_zero_without_occurrences() {
        let got = ScoringModel::bm25().score(0, term(3, 5), &field(10, 8.0, 80), 12);
        assert_eq!(got, 0.0);
    }

    #[test]
    fn bm25_parameters_are_tunable() {
        let f = field(10, 8.0, 80);
        let default = ScoringModel::bm25().score(3, term(3, 5), &f, 4);
        let tuned = ScoringModel::Bm25 { k1: 1.5, b: 0.75 }.score(3, term(3, 5), &f, 4);
        assert!(tuned > default);
    }

    #[test]
    fn boolean_ignores_frequency() {
        let f = field(10, 8.0, 80);
        assert_eq!(ScoringModel::Boolean.score(1, term(3, 5), &f, 4), 1.0);
        assert_eq!(ScoringModel::Boolean.score(9, term(3, 5), &f, 40), 1.0);
        assert_eq!(ScoringModel::Boolean.score(0, term(3, 5), &f, 4), 0.0);
    }

    #[test]
    fn dirichlet_matches_hand_computation() {
        let p: f64 = 5.0 / 80.0;
        let expected = (1.0 + 2.0 / (2000.0 * p)).ln() + (2000.0f64 / (12.0 + 2000.0)).ln();
        let got = ScoringModel::lm_dirichlet().score(2, term(3, 5), &field(10, 8.0, 80), 12);
        assert!((got - expected).abs() < EPS);
    }

    #[test]
    fn jelinek_mercer_matches_hand_computation() {
        let p: f64 = 5.0 / 80.0;
        let expected = (0.3 * 2.0 / 12.0 + 0.7 * p).ln();
        let got = ScoringModel::lm_jelinek_mercer().score(2, term(3, 5), &field(10, 8.0, 80), 12);
        assert!((got - expected).abs() < EPS);
    }

    #[test]
    fn selectors_resolve() {
        assert_eq!("bm25".parse::<ScoringModel>().unwrap(), ScoringModel::bm25());
        assert_eq!("TFIDF".parse::<ScoringModel>().unwrap(), ScoringModel::Classic);
        assert_eq!("lmjm".parse::<ScoringModel>().unwrap(), ScoringModel::lm_jelinek_mercer());
        assert_eq!("3".parse::<ScoringModel>().unwrap(), ScoringModel::lm_dirichlet());
        assert_eq!(ScoringModel::from_selector(2).unwrap(), ScoringModel::Boolean);
        assert!(ScoringModel::from_selector(9).is_err());
        assert!("pagerank".parse::<ScoringModel>().is_err());
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        assert!(ScoringModel::Bm25 { k1: 1.2, b: 1.5 }.validate().is_err());
        assert!(ScoringModel::LmDirichlet { mu: 0.0 }.validate().is_err());
        assert!(ScoringModel::LmJelinekMercer { lambda: 1.0 }.validate().is_err());
        assert!(ScoringModel::bm25().validate().is_ok());
    }
}
