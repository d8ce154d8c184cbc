//! Integration tests against a real Kiwi installation.
//!
//! These run only when a Kiwi shared library and model directory are
//! reachable, e.g. via `KIWI_BRIDGE_LIBRARY_PATH` and
//! `KIWI_BRIDGE_MODEL_PATH`. Without them the test logs a skip notice and
//! passes, so CI without Kiwi stays green.

use kiwi_bridge::{Analyzer, AnalyzeOptions, AnalyzerConfig, KiwiLibrary};
use serde_json::Value;

fn live_analyzer() -> Option<Analyzer> {
    let library = match KiwiLibrary::load_from_env_or_default() {
        Ok(library) => library,
        Err(error) => {
            eprintln!("skipping live kiwi tests: {error}");
            return None;
        }
    };
    match library.analyzer(&AnalyzerConfig::default()) {
        Ok(analyzer) => Some(analyzer),
        Err(error) => {
            eprintln!("skipping live kiwi tests: {error}");
            None
        }
    }
}

// One sequential test so the underlying library is loaded exactly once.
#[test]
fn live_kiwi_round_trip() {
    let Some(mut analyzer) = live_analyzer() else {
        return;
    };

    run_analyze_json(&analyzer);
    run_token_counts(&analyzer);
    run_add_user_word(&mut analyzer);
}

fn run_analyze_json(analyzer: &Analyzer) {
    let options = AnalyzeOptions::default().with_top_n(1);
    let json = analyzer
        .analyze_json("안녕하세요. 키위 형태소 분석기입니다.", &options)
        .expect("live analyze should succeed");
    let parsed: Value = serde_json::from_str(&json).expect("payload should parse");

    let candidates = parsed["candidates"].as_array().expect("candidates array");
    assert_eq!(candidates.len(), 1);
    let tokens = candidates[0]["tokens"].as_array().expect("tokens array");
    assert!(!tokens.is_empty());
    for token in tokens {
        assert!(token["form"].is_string());
        assert!(token["tag"].is_string());
        assert!(token["start"].is_u64());
        assert!(token["length"].is_u64());
    }
}

fn run_token_counts(analyzer: &Analyzer) {
    let options = AnalyzeOptions::default();
    let texts = ["하나", "둘입니다", "셋이 아닙니다"];

    let singles: Vec<usize> = texts
        .iter()
        .map(|text| {
            analyzer
                .token_count(text, &options)
                .expect("live count should succeed")
        })
        .collect();
    assert!(singles.iter().all(|count| *count > 0));

    let batch = analyzer
        .token_count_batch(&texts, &options)
        .expect("live batch should succeed");
    assert_eq!(batch, singles);

    let single_total: u64 = singles.iter().map(|count| *count as u64).sum();
    let total = analyzer
        .token_count_batch_runs(&texts, &options, 2)
        .expect("live runs should succeed");
    assert_eq!(total, single_total * 2);
}

fn run_add_user_word(analyzer: &mut Analyzer) {
    analyzer
        .add_user_word("데브시스터즈", "NNP", 0.0)
        .expect("live add word should succeed");

    let candidates = analyzer
        .analyze("데브시스터즈에 다닙니다", &AnalyzeOptions::default())
        .expect("live analyze should succeed");
    let found = candidates[0]
        .tokens
        .iter()
        .any(|token| token.form == "데브시스터즈" && token.tag == "NNP");
    assert!(found, "registered word should surface as a single token");
}
