//! Shared helpers for unit tests: serialized environment mutation and a
//! scripted in-process engine that stands in for a loaded Kiwi library.

use std::env;
use std::ffi::CStr;
use std::os::raw::{c_float, c_int};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::config::{KiwiAnalyzeOption, KiwiBuilderHandle, KiwiHandle, KiwiResHandle};
use crate::native::EngineApi;
use crate::types::{AnalysisCandidate, Token};

fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs `body` with the given environment variables applied, restoring the
/// previous values afterwards. Tests touching the environment must go
/// through this to stay race-free under the parallel test runner.
pub(crate) fn with_env_vars<F: FnOnce()>(vars: &[(&str, Option<&str>)], body: F) {
    let _guard = env_lock();
    let previous: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(name, _)| ((*name).to_string(), env::var(name).ok()))
        .collect();
    for (name, value) in vars {
        match value {
            Some(value) => env::set_var(name, value),
            None => env::remove_var(name),
        }
    }
    body();
    for (name, value) in previous {
        match value {
            Some(value) => env::set_var(&name, value),
            None => env::remove_var(&name),
        }
    }
}

const BUILDER_TAG: usize = 0x10;
const INSTANCE_BASE: usize = 0x100;
const RESULT_BASE: usize = 0x1000;

#[derive(Default)]
struct ScriptedState {
    next_instance: usize,
    next_result: usize,
    instances: Vec<usize>,
    open_results: Vec<usize>,
    fail_next_build: bool,
    fail_add_word: bool,
    negative_token_count: bool,
    negative_position: bool,
    last_error: Option<String>,
    events: Vec<String>,
    builder_inits: Vec<(String, i32, i32, i32)>,
    added_words: Vec<(String, String, f32)>,
    analyze_calls: Vec<(usize, String, i32, i32)>,
    canned: Vec<AnalysisCandidate>,
}

/// In-process [`EngineApi`] with scripted failures and a call log.
///
/// Handles are minted integers; every result reflects the canned candidate
/// list, so tests assert on control flow rather than linguistics.
pub(crate) struct ScriptedEngine {
    state: Mutex<ScriptedState>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self::with_candidates(vec![AnalysisCandidate {
            probability: -20.5,
            tokens: vec![
                Token {
                    form: "테스트".to_string(),
                    tag: "NNG".to_string(),
                    position: 0,
                    length: 3,
                    word_position: 0,
                    sent_position: 0,
                    score: -8.25,
                    typo_cost: 0.0,
                },
                Token {
                    form: "이다".to_string(),
                    tag: "VCP".to_string(),
                    position: 3,
                    length: 2,
                    word_position: 0,
                    sent_position: 0,
                    score: -4.5,
                    typo_cost: 0.0,
                },
            ],
        }])
    }

    pub(crate) fn with_candidates(canned: Vec<AnalysisCandidate>) -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                canned,
                ..ScriptedState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn fail_next_build(&self) {
        self.state().fail_next_build = true;
    }

    pub(crate) fn fail_add_word(&self) {
        self.state().fail_add_word = true;
    }

    pub(crate) fn set_negative_token_count(&self) {
        self.state().negative_token_count = true;
    }

    pub(crate) fn set_negative_position(&self) {
        self.state().negative_position = true;
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    pub(crate) fn builder_inits(&self) -> Vec<(String, i32, i32, i32)> {
        self.state().builder_inits.clone()
    }

    pub(crate) fn added_words(&self) -> Vec<(String, String, f32)> {
        self.state().added_words.clone()
    }

    pub(crate) fn analyze_calls(&self) -> Vec<(usize, String, i32, i32)> {
        self.state().analyze_calls.clone()
    }

    pub(crate) fn first_instance_id(&self) -> usize {
        self.state().instances[0]
    }

    pub(crate) fn open_result_count(&self) -> usize {
        self.state().open_results.len()
    }

    pub(crate) fn canned_token_count(&self) -> usize {
        self.state().canned[0].tokens.len()
    }
}

fn instance_id(handle: KiwiHandle) -> usize {
    handle as usize - INSTANCE_BASE
}

fn result_id(handle: KiwiResHandle) -> usize {
    handle as usize - RESULT_BASE
}

impl EngineApi for ScriptedEngine {
    fn version(&self) -> Option<String> {
        Some("scripted 0.0.1".to_string())
    }

    fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    fn clear_error(&self) {
        self.state().last_error = None;
    }

    fn builder_init(
        &self,
        model_path: &CStr,
        num_threads: c_int,
        options: c_int,
        init_dialect: c_int,
    ) -> KiwiBuilderHandle {
        let mut state = self.state();
        state.builder_inits.push((
            model_path.to_string_lossy().to_string(),
            num_threads,
            options,
            init_dialect,
        ));
        state.events.push("builder_init".to_string());
        BUILDER_TAG as KiwiBuilderHandle
    }

    fn builder_close(&self, _builder: KiwiBuilderHandle) -> c_int {
        self.state().events.push("builder_close".to_string());
        0
    }

    fn builder_add_word(
        &self,
        _builder: KiwiBuilderHandle,
        word: &CStr,
        tag: &CStr,
        score: c_float,
    ) -> c_int {
        let mut state = self.state();
        if state.fail_add_word {
            state.last_error = Some("scripted add failure".to_string());
            return -1;
        }
        state.added_words.push((
            word.to_string_lossy().to_string(),
            tag.to_string_lossy().to_string(),
            score,
        ));
        0
    }

    fn builder_build(&self, _builder: KiwiBuilderHandle) -> KiwiHandle {
        let mut state = self.state();
        if state.fail_next_build {
            state.fail_next_build = false;
            state.last_error = Some("scripted build failure".to_string());
            return std::ptr::null_mut();
        }
        state.next_instance += 1;
        let id = state.next_instance;
        state.instances.push(id);
        state.events.push(format!("build:{id}"));
        (INSTANCE_BASE + id) as KiwiHandle
    }

    fn close(&self, instance: KiwiHandle) -> c_int {
        let id = instance_id(instance);
        self.state().events.push(format!("close_instance:{id}"));
        0
    }

    fn analyze(
        &self,
        instance: KiwiHandle,
        text: &CStr,
        top_n: c_int,
        options: KiwiAnalyzeOption,
    ) -> KiwiResHandle {
        let mut state = self.state();
        state.analyze_calls.push((
            instance_id(instance),
            text.to_string_lossy().to_string(),
            top_n,
            options.match_options,
        ));
        state.next_result += 1;
        let id = state.next_result;
        state.open_results.push(id);
        state.events.push(format!("analyze:{id}"));
        (RESULT_BASE + id) as KiwiResHandle
    }

    fn res_size(&self, _result: KiwiResHandle) -> c_int {
        self.state().canned.len() as c_int
    }

    fn res_prob(&self, _result: KiwiResHandle, candidate: c_int) -> c_float {
        self.state().canned[candidate as usize].probability
    }

    fn res_word_num(&self, _result: KiwiResHandle, candidate: c_int) -> c_int {
        let state = self.state();
        if state.negative_token_count {
            return -1;
        }
        state.canned[candidate as usize].tokens.len() as c_int
    }

    fn res_form(&self, _result: KiwiResHandle, candidate: c_int, token: c_int) -> Option<String> {
        Some(self.state().canned[candidate as usize].tokens[token as usize].form.clone())
    }

    fn res_tag(&self, _result: KiwiResHandle, candidate: c_int, token: c_int) -> Option<String> {
        Some(self.state().canned[candidate as usize].tokens[token as usize].tag.clone())
    }

    fn res_position(&self, _result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int {
        let state = self.state();
        if state.negative_position {
            return -1;
        }
        state.canned[candidate as usize].tokens[token as usize].position as c_int
    }

    fn res_length(&self, _result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int {
        self.state().canned[candidate as usize].tokens[token as usize].length as c_int
    }

    fn res_word_position(&self, _result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int {
        self.state().canned[candidate as usize].tokens[token as usize].word_position as c_int
    }

    fn res_sent_position(&self, _result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int {
        self.state().canned[candidate as usize].tokens[token as usize].sent_position as c_int
    }

    fn res_score(&self, _result: KiwiResHandle, candidate: c_int, token: c_int) -> c_float {
        self.state().canned[candidate as usize].tokens[token as usize].score
    }

    fn res_typo_cost(&self, _result: KiwiResHandle, candidate: c_int, token: c_int) -> c_float {
        self.state().canned[candidate as usize].tokens[token as usize].typo_cost
    }

    fn res_close(&self, result: KiwiResHandle) -> c_int {
        let id = result_id(result);
        let mut state = self.state();
        state.open_results.retain(|open| *open != id);
        state.events.push(format!("res_close:{id}"));
        0
    }
}
