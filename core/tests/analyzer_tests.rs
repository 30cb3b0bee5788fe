use ircore::analyzer::{is_stopword, Analyzer, AnalyzerConfig};

fn without_stemming() -> AnalyzerConfig {
    AnalyzerConfig { stem: false, ..AnalyzerConfig::default() }
}

#[test]
fn stop_set_is_the_short_english_list() {
    for word in ["a", "into", "such", "there", "will", "with"] {
        assert!(is_stopword(word), "{word}");
    }
    // common words outside the 33-word set survive
    let words = Analyzer::new(without_stemming()).analyze("What flows over the plate with such angles");
    assert_eq!(words, vec!["what", "flows", "over", "plate", "angles"]);
}

#[test]
fn keeping_stopwords_keeps_them_in_order() {
    let cfg = AnalyzerConfig { remove_stopwords: false, ..without_stemming() };
    assert_eq!(Analyzer::new(cfg).analyze("Flow INTO the Wing"), vec!["flow", "into", "the", "wing"]);
}

#[test]
fn stemming_toggle_maps_plurals_to_one_root() {
    let stemmed = Analyzer::default();
    assert_eq!(stemmed.analyze("wings plates"), stemmed.analyze("wing plate"));
    let surface = Analyzer::new(without_stemming());
    assert_ne!(surface.analyze("wings plates"), surface.analyze("wing plate"));
}

#[test]
fn unicode_normalization_toggle_folds_ligatures() {
    let folded = Analyzer::new(without_stemming()).analyze("ﬂow");
    assert_eq!(folded, vec!["flow"]);
    let raw = AnalyzerConfig { normalize_unicode: false, ..without_stemming() };
    assert_eq!(Analyzer::new(raw).analyze("ﬂow"), vec!["ﬂow"]);
}

#[test]
fn analyzer_is_shared_across_threads() {
    let analyzer = Analyzer::default();
    let expected = analyzer.analyze("supersonic flow over wings");
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| analyzer.analyze("supersonic flow over wings"))).collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}
