use std::os::raw::c_int;
use std::path::{Path, PathBuf};

use crate::constants::{KIWI_DIALECT_ALL, KIWI_MATCH_ALL_WITH_NORMALIZING};
use crate::discovery::model_path_override;
use crate::error::{BridgeError, Result};

/// One morpheme-level token within an analysis candidate.
///
/// Positional fields are character offsets as reported by the Kiwi C API.
#[derive(Debug, Clone)]
pub struct Token {
    /// Surface form.
    pub form: String,
    /// Part-of-speech tag.
    pub tag: String,
    /// Start offset within the input text.
    pub position: usize,
    /// Length of the surface form.
    pub length: usize,
    /// Index of the containing word.
    pub word_position: usize,
    /// Index of the containing sentence.
    pub sent_position: usize,
    /// Per-token language-model score.
    pub score: f32,
    /// Typo-correction penalty applied to match this token.
    pub typo_cost: f32,
}

/// One ranked interpretation of an input sentence.
#[derive(Debug, Clone)]
pub struct AnalysisCandidate {
    /// Log-likelihood of this interpretation.
    pub probability: f32,
    /// Tokens in analysis order.
    pub tokens: Vec<Token>,
}

/// Per-call analysis options.
///
/// A `match_options` of `0` means "use the analyzer's default mask".
#[derive(Debug, Clone, Copy)]
pub struct AnalyzeOptions {
    /// Number of candidates to request (must be >= 1).
    pub top_n: usize,
    /// Match option bitmask, `0` for the analyzer default.
    pub match_options: i32,
    /// Whether to allow an open sentence ending.
    pub open_ending: bool,
    /// Dialect bitmask allowed during analysis.
    pub allowed_dialects: i32,
    /// Score penalty applied to dialect matches.
    pub dialect_cost: f32,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            top_n: 1,
            match_options: KIWI_MATCH_ALL_WITH_NORMALIZING,
            open_ending: false,
            allowed_dialects: KIWI_DIALECT_ALL,
            dialect_cost: 3.0,
        }
    }
}

impl AnalyzeOptions {
    /// Sets the number of candidates to request.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Sets the match option bitmask (`0` defers to the analyzer default).
    pub fn with_match_options(mut self, match_options: i32) -> Self {
        self.match_options = match_options;
        self
    }

    /// Sets whether an open sentence ending is allowed.
    pub fn with_open_ending(mut self, open_ending: bool) -> Self {
        self.open_ending = open_ending;
        self
    }

    /// Sets the allowed dialect bitmask.
    pub fn with_allowed_dialects(mut self, allowed_dialects: i32) -> Self {
        self.allowed_dialects = allowed_dialects;
        self
    }

    /// Sets the dialect score penalty.
    pub fn with_dialect_cost(mut self, dialect_cost: f32) -> Self {
        self.dialect_cost = dialect_cost;
        self
    }

    pub(crate) fn validated_top_n(&self) -> Result<c_int> {
        if self.top_n == 0 {
            return Err(BridgeError::InvalidInput(
                "AnalyzeOptions.top_n must be >= 1".to_string(),
            ));
        }
        if self.top_n > c_int::MAX as usize {
            return Err(BridgeError::InvalidInput(format!(
                "AnalyzeOptions.top_n must be <= {}",
                c_int::MAX
            )));
        }
        Ok(self.top_n as c_int)
    }
}

/// Configuration for constructing an [`crate::Analyzer`].
///
/// `build_options` and `default_match_options` of `0` select the documented
/// defaults (`KIWI_BUILD_DEFAULT_WITH_CONG` and
/// `KIWI_MATCH_ALL_WITH_NORMALIZING`).
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Model directory path; resolved from the environment when absent.
    pub model_path: Option<PathBuf>,
    /// Worker thread count handed to the builder (`-1` lets Kiwi decide).
    pub num_threads: i32,
    /// Dictionary build option bitmask, `0` for the default.
    pub build_options: i32,
    /// Match option bitmask applied when a call passes `0`.
    pub default_match_options: i32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model_path: model_path_override(),
            num_threads: -1,
            build_options: 0,
            default_match_options: 0,
        }
    }
}

impl AnalyzerConfig {
    /// Sets an explicit model directory path.
    pub fn with_model_path(mut self, model_path: impl AsRef<Path>) -> Self {
        self.model_path = Some(model_path.as_ref().to_path_buf());
        self
    }

    /// Sets the builder worker thread count.
    pub fn with_num_threads(mut self, num_threads: i32) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Sets the dictionary build option bitmask.
    pub fn with_build_options(mut self, build_options: i32) -> Self {
        self.build_options = build_options;
        self
    }

    /// Sets the default match option bitmask.
    pub fn with_default_match_options(mut self, default_match_options: i32) -> Self {
        self.default_match_options = default_match_options;
        self
    }
}
