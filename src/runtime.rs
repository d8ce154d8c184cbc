use std::ffi::CString;
use std::os::raw::c_int;
use std::path::Path;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{KiwiAnalyzeOption, KiwiBuilderHandle, KiwiHandle, KiwiResHandle};
use crate::constants::{
    KIWI_BUILD_DEFAULT_WITH_CONG, KIWI_DIALECT_STANDARD, KIWI_MATCH_ALL_WITH_NORMALIZING,
};
use crate::discovery::{
    default_library_candidates, discover_default_library_path, library_path_override,
    resolve_model_path, LIBRARY_PATH_ENV, LIBRARY_PATH_ENV_LEGACY,
};
use crate::error::{BridgeError, Result};
use crate::native::{api_error, init_error, EngineApi, LoadedEngine};
use crate::serializer::{analysis_to_json, batch_to_json};
use crate::types::{AnalysisCandidate, AnalyzeOptions, AnalyzerConfig, Token};

/// Process-wide engine shared by the C ABI entry points.
static SHARED_ENGINE: Mutex<Option<Arc<dyn EngineApi>>> = Mutex::new(None);

fn shared_engine_slot() -> MutexGuard<'static, Option<Arc<dyn EngineApi>>> {
    SHARED_ENGINE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A loaded Kiwi dynamic library.
///
/// Cloning is cheap; all clones share the same underlying engine and the
/// library stays open until the last clone is dropped.
#[derive(Clone)]
pub struct KiwiLibrary {
    engine: Arc<dyn EngineApi>,
}

impl KiwiLibrary {
    /// Loads the Kiwi library from an explicit path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let engine = LoadedEngine::open(path)?;
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    /// Loads the Kiwi library from well-known locations and bare sonames.
    pub fn load_default() -> Result<Self> {
        let mut tried = Vec::new();
        if let Some(path) = discover_default_library_path() {
            match Self::load(&path) {
                Ok(library) => return Ok(library),
                Err(error) => tried.push(error.to_string()),
            }
        }
        for candidate in default_library_candidates() {
            match Self::load(candidate) {
                Ok(library) => return Ok(library),
                Err(error) => tried.push(error.to_string()),
            }
        }
        Err(BridgeError::LibraryLoad(format!(
            "no kiwi library found; set {LIBRARY_PATH_ENV} (legacy: {LIBRARY_PATH_ENV_LEGACY}) \
             to the library path; tried: {}",
            tried.join("; ")
        )))
    }

    /// Loads from the environment override when set, otherwise falls back to
    /// [`KiwiLibrary::load_default`].
    pub fn load_from_env_or_default() -> Result<Self> {
        if let Some(path) = library_path_override() {
            return Self::load(path);
        }
        Self::load_default()
    }

    /// Returns the process-wide shared engine, loading it on first use.
    pub(crate) fn shared() -> Result<Arc<dyn EngineApi>> {
        let mut slot = shared_engine_slot();
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }
        let library = Self::load_from_env_or_default()?;
        let engine = Arc::clone(&library.engine);
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Returns the shared engine only if a previous call already loaded it.
    pub(crate) fn shared_if_loaded() -> Option<Arc<dyn EngineApi>> {
        shared_engine_slot().as_ref().map(Arc::clone)
    }

    /// Version string reported by the loaded library.
    pub fn version(&self) -> Option<String> {
        self.engine.version()
    }

    /// Builds an [`Analyzer`] backed by this library.
    pub fn analyzer(&self, config: &AnalyzerConfig) -> Result<Analyzer> {
        Analyzer::new(Arc::clone(&self.engine), config)
    }

    #[cfg(test)]
    pub(crate) fn with_engine(engine: Arc<dyn EngineApi>) -> Self {
        Self { engine }
    }
}

#[cfg(test)]
pub(crate) fn install_shared_engine(engine: Arc<dyn EngineApi>) {
    *shared_engine_slot() = Some(engine);
}

#[cfg(test)]
pub(crate) fn clear_shared_engine() {
    *shared_engine_slot() = None;
}

/// A built morphological analyzer.
///
/// Owns a builder handle for dictionary mutation and the Kiwi instance built
/// from it. User-word additions rebuild the instance; a failed rebuild keeps
/// the previous instance usable.
pub struct Analyzer {
    engine: Arc<dyn EngineApi>,
    builder: KiwiBuilderHandle,
    instance: KiwiHandle,
    default_match_options: i32,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("builder", &self.builder)
            .field("instance", &self.instance)
            .field("default_match_options", &self.default_match_options)
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    pub(crate) fn new(engine: Arc<dyn EngineApi>, config: &AnalyzerConfig) -> Result<Self> {
        let model_path = resolve_model_path(config.model_path.as_deref())?;
        let model_c = CString::new(model_path.to_string_lossy().to_string())?;

        let build_options = if config.build_options == 0 {
            KIWI_BUILD_DEFAULT_WITH_CONG
        } else {
            config.build_options
        };
        let default_match_options = if config.default_match_options == 0 {
            KIWI_MATCH_ALL_WITH_NORMALIZING
        } else {
            config.default_match_options
        };

        engine.clear_error();
        let builder = engine.builder_init(
            &model_c,
            config.num_threads,
            build_options,
            KIWI_DIALECT_STANDARD,
        );
        if builder.is_null() {
            return Err(init_error(
                engine.as_ref(),
                "kiwi_builder_init returned null",
            ));
        }

        let mut analyzer = Self {
            engine,
            builder,
            instance: ptr::null_mut(),
            default_match_options,
        };
        // A failed first build drops the analyzer, which releases the
        // builder handle.
        analyzer.rebuild().map_err(|error| match error {
            BridgeError::Api(message) => BridgeError::Init(message),
            other => other,
        })?;
        Ok(analyzer)
    }

    /// Rebuilds the Kiwi instance from the current builder state.
    ///
    /// The previous instance is only closed after the new one exists, so a
    /// build failure leaves the analyzer on its last good dictionary.
    fn rebuild(&mut self) -> Result<()> {
        self.engine.clear_error();
        let new_instance = self.engine.builder_build(self.builder);
        if new_instance.is_null() {
            return Err(api_error(
                self.engine.as_ref(),
                "kiwi_builder_build returned null",
            ));
        }
        if !self.instance.is_null() {
            self.engine.close(self.instance);
        }
        self.instance = new_instance;
        Ok(())
    }

    /// Registers a user dictionary word and rebuilds the instance.
    pub fn add_user_word(&mut self, word: &str, tag: &str, score: f32) -> Result<()> {
        if word.is_empty() {
            return Err(BridgeError::InvalidInput(
                "word must not be empty".to_string(),
            ));
        }
        if tag.is_empty() {
            return Err(BridgeError::InvalidInput(
                "tag must not be empty".to_string(),
            ));
        }
        let word_c = CString::new(word)?;
        let tag_c = CString::new(tag)?;

        self.engine.clear_error();
        let status = self
            .engine
            .builder_add_word(self.builder, &word_c, &tag_c, score);
        if status < 0 {
            return Err(api_error(
                self.engine.as_ref(),
                "kiwi_builder_add_word failed",
            ));
        }
        self.rebuild()
    }

    pub(crate) fn analyze_result(
        &self,
        text: &str,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisGuard> {
        let top_n = options.validated_top_n()?;
        let text_c = CString::new(text)?;
        let match_options = if options.match_options == 0 {
            self.default_match_options
        } else {
            options.match_options
        };
        let raw_options = KiwiAnalyzeOption {
            match_options,
            blocklist: ptr::null_mut(),
            open_ending: c_int::from(options.open_ending),
            allowed_dialects: options.allowed_dialects,
            dialect_cost: options.dialect_cost,
        };

        self.engine.clear_error();
        let handle = self
            .engine
            .analyze(self.instance, &text_c, top_n, raw_options);
        if handle.is_null() {
            return Err(api_error(self.engine.as_ref(), "kiwi_analyze returned null"));
        }
        Ok(AnalysisGuard {
            engine: Arc::clone(&self.engine),
            handle,
        })
    }

    /// Analyzes `text` and returns the ranked candidates.
    pub fn analyze(&self, text: &str, options: &AnalyzeOptions) -> Result<Vec<AnalysisCandidate>> {
        self.analyze_result(text, options)?.candidates()
    }

    /// Analyzes `text` and returns the `{"candidates":[...]}` JSON payload.
    pub fn analyze_json(&self, text: &str, options: &AnalyzeOptions) -> Result<String> {
        let candidates = self.analyze(text, options)?;
        analysis_to_json(&candidates)?.into_string()
    }

    pub(crate) fn analyze_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        options: &AnalyzeOptions,
    ) -> Result<Vec<Vec<AnalysisCandidate>>> {
        let mut analyses = Vec::with_capacity(texts.len());
        for text in texts {
            analyses.push(self.analyze(text.as_ref(), options)?);
        }
        Ok(analyses)
    }

    /// Analyzes each text and returns the `{"results":[...]}` JSON payload.
    pub fn analyze_json_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        options: &AnalyzeOptions,
    ) -> Result<String> {
        let analyses = self.analyze_batch(texts, options)?;
        batch_to_json(&analyses)?.into_string()
    }

    /// Token count of the best candidate for `text`.
    pub fn token_count(&self, text: &str, options: &AnalyzeOptions) -> Result<usize> {
        self.analyze_result(text, options)?.first_token_count()
    }

    /// Token count of the best candidate for each text.
    pub fn token_count_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        options: &AnalyzeOptions,
    ) -> Result<Vec<usize>> {
        let mut counts = Vec::with_capacity(texts.len());
        for text in texts {
            counts.push(self.token_count(text.as_ref(), options)?);
        }
        Ok(counts)
    }

    /// Sums the best-candidate token counts over `runs` repetitions of the
    /// whole batch. Used for throughput measurement.
    pub fn token_count_batch_runs<S: AsRef<str>>(
        &self,
        texts: &[S],
        options: &AnalyzeOptions,
        runs: usize,
    ) -> Result<u64> {
        let mut total = 0u64;
        for _ in 0..runs {
            for text in texts {
                total += self.token_count(text.as_ref(), options)? as u64;
            }
        }
        Ok(total)
    }
}

impl Drop for Analyzer {
    fn drop(&mut self) {
        if !self.instance.is_null() {
            self.engine.close(self.instance);
            self.instance = ptr::null_mut();
        }
        if !self.builder.is_null() {
            self.engine.builder_close(self.builder);
            self.builder = ptr::null_mut();
        }
    }
}

/// RAII wrapper around a Kiwi analysis result handle.
pub(crate) struct AnalysisGuard {
    engine: Arc<dyn EngineApi>,
    handle: KiwiResHandle,
}

impl AnalysisGuard {
    pub(crate) fn candidate_count(&self) -> Result<usize> {
        let size = self.engine.res_size(self.handle);
        if size < 0 {
            return Err(api_error(
                self.engine.as_ref(),
                "kiwi_res_size returned a negative count",
            ));
        }
        Ok(size as usize)
    }

    pub(crate) fn candidates(&self) -> Result<Vec<AnalysisCandidate>> {
        let count = self.candidate_count()?;
        let mut candidates = Vec::with_capacity(count);
        for candidate in 0..count as c_int {
            let probability = self.engine.res_prob(self.handle, candidate);
            let tokens = self.tokens_for_candidate(candidate)?;
            candidates.push(AnalysisCandidate {
                probability,
                tokens,
            });
        }
        Ok(candidates)
    }

    fn tokens_for_candidate(&self, candidate: c_int) -> Result<Vec<Token>> {
        let token_count = self.engine.res_word_num(self.handle, candidate);
        if token_count < 0 {
            return Err(api_error(
                self.engine.as_ref(),
                "kiwi_res_word_num returned a negative token count",
            ));
        }
        let mut tokens = Vec::with_capacity(token_count as usize);
        for token in 0..token_count {
            let position = self.engine.res_position(self.handle, candidate, token);
            let length = self.engine.res_length(self.handle, candidate, token);
            let word_position = self.engine.res_word_position(self.handle, candidate, token);
            let sent_position = self.engine.res_sent_position(self.handle, candidate, token);
            if position < 0 || length < 0 || word_position < 0 || sent_position < 0 {
                return Err(api_error(
                    self.engine.as_ref(),
                    "kiwi result returned negative token metadata",
                ));
            }
            tokens.push(Token {
                form: self
                    .engine
                    .res_form(self.handle, candidate, token)
                    .unwrap_or_default(),
                tag: self
                    .engine
                    .res_tag(self.handle, candidate, token)
                    .unwrap_or_default(),
                position: position as usize,
                length: length as usize,
                word_position: word_position as usize,
                sent_position: sent_position as usize,
                score: self.engine.res_score(self.handle, candidate, token),
                typo_cost: self.engine.res_typo_cost(self.handle, candidate, token),
            });
        }
        Ok(tokens)
    }

    /// Token count of the best candidate, `0` when there are no candidates.
    pub(crate) fn first_token_count(&self) -> Result<usize> {
        if self.candidate_count()? == 0 {
            return Ok(0);
        }
        let token_count = self.engine.res_word_num(self.handle, 0);
        if token_count < 0 {
            return Err(api_error(
                self.engine.as_ref(),
                "kiwi_res_word_num returned a negative token count",
            ));
        }
        Ok(token_count as usize)
    }
}

impl Drop for AnalysisGuard {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            self.engine.res_close(self.handle);
            self.handle = ptr::null_mut();
        }
    }
}
