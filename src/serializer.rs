//! JSON payload assembly for analysis results.
//!
//! Payloads are built directly into a [`JsonBuffer`] so the result can cross
//! the C ABI without an intermediate allocation. Floats are rendered with
//! Rust's shortest round-trip formatting.

use crate::buffer::JsonBuffer;
use crate::error::Result;
use crate::types::AnalysisCandidate;

const INITIAL_CAPACITY: usize = 1024;

/// Serializes one analysis into `{"candidates":[...]}`.
pub(crate) fn analysis_to_json(candidates: &[AnalysisCandidate]) -> Result<JsonBuffer> {
    let mut buffer = JsonBuffer::with_capacity(INITIAL_CAPACITY)?;
    write_candidates(&mut buffer, candidates)?;
    Ok(buffer)
}

/// Serializes a batch of analyses into `{"results":[...]}` where each entry
/// has the single-analysis shape.
pub(crate) fn batch_to_json(analyses: &[Vec<AnalysisCandidate>]) -> Result<JsonBuffer> {
    let mut buffer = JsonBuffer::with_capacity(INITIAL_CAPACITY)?;
    buffer.push_str("{\"results\":[")?;
    for (index, candidates) in analyses.iter().enumerate() {
        if index > 0 {
            buffer.push_str(",")?;
        }
        write_candidates(&mut buffer, candidates)?;
    }
    buffer.push_str("]}")?;
    Ok(buffer)
}

fn write_candidates(buffer: &mut JsonBuffer, candidates: &[AnalysisCandidate]) -> Result<()> {
    buffer.push_str("{\"candidates\":[")?;
    for (candidate_index, candidate) in candidates.iter().enumerate() {
        if candidate_index > 0 {
            buffer.push_str(",")?;
        }
        buffer.push_str("{\"probability\":")?;
        buffer.push_fmt(format_args!("{}", candidate.probability))?;
        buffer.push_str(",\"tokens\":[")?;
        for (token_index, token) in candidate.tokens.iter().enumerate() {
            if token_index > 0 {
                buffer.push_str(",")?;
            }
            buffer.push_str("{\"form\":\"")?;
            buffer.push_json_escaped(&token.form)?;
            buffer.push_str("\",\"tag\":\"")?;
            buffer.push_json_escaped(&token.tag)?;
            buffer.push_str("\",\"start\":")?;
            buffer.push_fmt(format_args!("{}", token.position))?;
            buffer.push_str(",\"length\":")?;
            buffer.push_fmt(format_args!("{}", token.length))?;
            buffer.push_str(",\"wordPosition\":")?;
            buffer.push_fmt(format_args!("{}", token.word_position))?;
            buffer.push_str(",\"sentPosition\":")?;
            buffer.push_fmt(format_args!("{}", token.sent_position))?;
            buffer.push_str(",\"score\":")?;
            buffer.push_fmt(format_args!("{}", token.score))?;
            buffer.push_str(",\"typoCost\":")?;
            buffer.push_fmt(format_args!("{}", token.typo_cost))?;
            buffer.push_str("}")?;
        }
        buffer.push_str("]}")?;
    }
    buffer.push_str("]}")?;
    Ok(())
}

#[cfg(test)]
mod serializer_tests {
    use super::{analysis_to_json, batch_to_json};
    use crate::types::{AnalysisCandidate, Token};
    use serde_json::Value;

    fn sample_token(form: &str, tag: &str) -> Token {
        Token {
            form: form.to_string(),
            tag: tag.to_string(),
            position: 0,
            length: form.chars().count(),
            word_position: 0,
            sent_position: 0,
            score: -1.25,
            typo_cost: 0.0,
        }
    }

    fn sample_candidate(forms: &[(&str, &str)]) -> AnalysisCandidate {
        AnalysisCandidate {
            probability: -12.5,
            tokens: forms
                .iter()
                .map(|(form, tag)| sample_token(form, tag))
                .collect(),
        }
    }

    #[test]
    fn empty_analysis_yields_empty_candidate_array() {
        let json = analysis_to_json(&[])
            .expect("serialization should succeed")
            .into_string()
            .expect("valid UTF-8");
        assert_eq!(json, "{\"candidates\":[]}");
    }

    #[test]
    fn payload_shape_matches_contract() {
        let candidates = vec![sample_candidate(&[("안녕", "NNG"), ("하세요", "XSV")])];
        let json = analysis_to_json(&candidates)
            .expect("serialization should succeed")
            .into_string()
            .expect("valid UTF-8");
        let parsed: Value = serde_json::from_str(&json).expect("payload should parse");

        let first = &parsed["candidates"][0];
        assert_eq!(first["probability"].as_f64().expect("probability"), -12.5);
        let tokens = first["tokens"].as_array().expect("tokens array");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0]["form"], "안녕");
        assert_eq!(tokens[0]["tag"], "NNG");
        assert_eq!(tokens[0]["start"], 0);
        assert_eq!(tokens[0]["length"], 2);
        assert_eq!(tokens[0]["wordPosition"], 0);
        assert_eq!(tokens[0]["sentPosition"], 0);
        assert_eq!(tokens[0]["score"].as_f64().expect("score"), -1.25);
        assert_eq!(tokens[0]["typoCost"].as_f64().expect("typoCost"), 0.0);
    }

    #[test]
    fn special_characters_survive_escaping() {
        let mut token = sample_token("a\"b\\c\nd\te", "SSO");
        token.tag = "tag\u{1}ctrl".to_string();
        let candidates = vec![AnalysisCandidate {
            probability: 0.0,
            tokens: vec![token],
        }];
        let json = analysis_to_json(&candidates)
            .expect("serialization should succeed")
            .into_string()
            .expect("valid UTF-8");
        let parsed: Value = serde_json::from_str(&json).expect("payload should parse");
        assert_eq!(parsed["candidates"][0]["tokens"][0]["form"], "a\"b\\c\nd\te");
        assert_eq!(parsed["candidates"][0]["tokens"][0]["tag"], "tag\u{1}ctrl");
    }

    #[test]
    fn batch_preserves_order_and_shape() {
        let analyses = vec![
            vec![sample_candidate(&[("하나", "NR")])],
            Vec::new(),
            vec![sample_candidate(&[("셋", "NR"), ("이다", "VCP")])],
        ];
        let json = batch_to_json(&analyses)
            .expect("serialization should succeed")
            .into_string()
            .expect("valid UTF-8");
        let parsed: Value = serde_json::from_str(&json).expect("payload should parse");
        let results = parsed["results"].as_array().expect("results array");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["candidates"][0]["tokens"][0]["form"], "하나");
        assert_eq!(
            results[1]["candidates"].as_array().expect("array").len(),
            0
        );
        assert_eq!(
            results[2]["candidates"][0]["tokens"]
                .as_array()
                .expect("array")
                .len(),
            2
        );
    }

    #[test]
    fn floats_round_trip_through_display() {
        let mut candidate = sample_candidate(&[("값", "NNG")]);
        candidate.probability = -0.000123;
        candidate.tokens[0].score = 1.5e10;
        let json = analysis_to_json(&[candidate])
            .expect("serialization should succeed")
            .into_string()
            .expect("valid UTF-8");
        let parsed: Value = serde_json::from_str(&json).expect("payload should parse");
        let probability = parsed["candidates"][0]["probability"]
            .as_f64()
            .expect("probability");
        assert_eq!(probability as f32, -0.000123f32);
        let score = parsed["candidates"][0]["tokens"][0]["score"]
            .as_f64()
            .expect("score");
        assert_eq!(score as f32, 1.5e10f32);
    }
}
