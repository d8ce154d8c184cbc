//! C ABI surface of the bridge.
//!
//! Every entry point is `extern "C"`, reports failure through a sentinel
//! return value, and records the error message in a thread-local slot read
//! back via [`kiwi_bridge_last_error`]. Strings returned to the caller are
//! heap-allocated and must be released with [`kiwi_bridge_free_string`].

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_float, c_int};
use std::ptr;
use std::sync::OnceLock;

use crate::error::{BridgeError, Result};
use crate::runtime::{Analyzer, KiwiLibrary};
use crate::serializer::{analysis_to_json, batch_to_json};
use crate::types::{AnalyzeOptions, AnalyzerConfig};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

fn set_last_error(error: &BridgeError) {
    let message = error.to_string().replace('\0', " ");
    if let Ok(message) = CString::new(message) {
        LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
    }
}

fn failure<T>(error: BridgeError, sentinel: T) -> T {
    set_last_error(&error);
    sentinel
}

unsafe fn required_str<'a>(pointer: *const c_char, name: &str) -> Result<&'a str> {
    if pointer.is_null() {
        return Err(BridgeError::InvalidInput(format!("{name} must not be null")));
    }
    CStr::from_ptr(pointer)
        .to_str()
        .map_err(|_| BridgeError::InvalidInput(format!("{name} must be valid UTF-8")))
}

unsafe fn optional_str<'a>(pointer: *const c_char, name: &str) -> Result<Option<&'a str>> {
    if pointer.is_null() {
        return Ok(None);
    }
    let text = required_str(pointer, name)?;
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}

unsafe fn analyzer_ref<'a>(handle: *mut Analyzer) -> Result<&'a Analyzer> {
    handle
        .as_ref()
        .ok_or_else(|| BridgeError::InvalidHandle("analyzer handle is null".to_string()))
}

unsafe fn analyzer_mut<'a>(handle: *mut Analyzer) -> Result<&'a mut Analyzer> {
    handle
        .as_mut()
        .ok_or_else(|| BridgeError::InvalidHandle("analyzer handle is null".to_string()))
}

unsafe fn collect_texts<'a>(
    texts: *const *const c_char,
    count: c_int,
) -> Result<Vec<&'a str>> {
    if count < 0 {
        return Err(BridgeError::InvalidInput(
            "text count must not be negative".to_string(),
        ));
    }
    if count > 0 && texts.is_null() {
        return Err(BridgeError::InvalidInput(
            "texts must not be null".to_string(),
        ));
    }
    let mut collected = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        let pointer = *texts.add(index);
        collected.push(required_str(pointer, "texts entry")?);
    }
    Ok(collected)
}

/// `top_n <= 0` falls back to a single candidate; `match_options == 0`
/// defers to the analyzer's configured default mask.
fn options_for(top_n: c_int, match_options: c_int) -> AnalyzeOptions {
    let top_n = if top_n <= 0 { 1 } else { top_n as usize };
    AnalyzeOptions::default()
        .with_top_n(top_n)
        .with_match_options(match_options)
}

fn count_to_c_int(count: usize) -> c_int {
    c_int::try_from(count).unwrap_or(c_int::MAX)
}

/// Creates an analyzer and returns an opaque handle, or null on failure.
///
/// `model_path` may be null or empty to use the `KIWI_BRIDGE_MODEL_PATH`
/// environment variable. Zero `build_options` and `default_match_options`
/// select the documented defaults.
///
/// # Safety
///
/// `model_path`, when non-null, must point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn kiwi_bridge_init(
    model_path: *const c_char,
    num_threads: c_int,
    build_options: c_int,
    default_match_options: c_int,
) -> *mut Analyzer {
    clear_last_error();
    let result = (|| -> Result<*mut Analyzer> {
        let engine = KiwiLibrary::shared()?;
        let mut config = AnalyzerConfig::default()
            .with_num_threads(num_threads)
            .with_build_options(build_options)
            .with_default_match_options(default_match_options);
        if let Some(path) = optional_str(model_path, "model_path")? {
            config = config.with_model_path(path);
        }
        let analyzer = Analyzer::new(engine, &config)?;
        Ok(Box::into_raw(Box::new(analyzer)))
    })();
    match result {
        Ok(handle) => handle,
        Err(error) => failure(error, ptr::null_mut()),
    }
}

/// Destroys an analyzer created by [`kiwi_bridge_init`].
///
/// Returns `0` on success, `-1` when the handle is null.
///
/// # Safety
///
/// `analyzer` must be a handle returned by [`kiwi_bridge_init`] that has not
/// been closed already.
#[no_mangle]
pub unsafe extern "C" fn kiwi_bridge_close(analyzer: *mut Analyzer) -> c_int {
    clear_last_error();
    if analyzer.is_null() {
        return failure(
            BridgeError::InvalidHandle("analyzer handle is null".to_string()),
            -1,
        );
    }
    drop(Box::from_raw(analyzer));
    0
}

/// Analyzes `text` and returns the `{"candidates":[...]}` JSON payload, or
/// null on failure. Release the string with [`kiwi_bridge_free_string`].
///
/// # Safety
///
/// `analyzer` must be a live handle from [`kiwi_bridge_init`] and `text`
/// must point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn kiwi_bridge_analyze_json(
    analyzer: *mut Analyzer,
    text: *const c_char,
    top_n: c_int,
    match_options: c_int,
) -> *mut c_char {
    clear_last_error();
    let result = (|| -> Result<*mut c_char> {
        let analyzer = analyzer_ref(analyzer)?;
        let text = required_str(text, "text")?;
        let candidates = analyzer.analyze(text, &options_for(top_n, match_options))?;
        analysis_to_json(&candidates)?.into_raw()
    })();
    match result {
        Ok(payload) => payload,
        Err(error) => failure(error, ptr::null_mut()),
    }
}

/// Analyzes `count` texts and returns the `{"results":[...]}` JSON payload,
/// or null on failure. Release the string with [`kiwi_bridge_free_string`].
///
/// # Safety
///
/// `analyzer` must be a live handle from [`kiwi_bridge_init`]; `texts` must
/// point to `count` NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn kiwi_bridge_analyze_json_batch(
    analyzer: *mut Analyzer,
    texts: *const *const c_char,
    count: c_int,
    top_n: c_int,
    match_options: c_int,
) -> *mut c_char {
    clear_last_error();
    let result = (|| -> Result<*mut c_char> {
        let analyzer = analyzer_ref(analyzer)?;
        let texts = collect_texts(texts, count)?;
        let analyses = analyzer.analyze_batch(&texts, &options_for(top_n, match_options))?;
        batch_to_json(&analyses)?.into_raw()
    })();
    match result {
        Ok(payload) => payload,
        Err(error) => failure(error, ptr::null_mut()),
    }
}

/// Token count of the best candidate for `text`, or `-1` on failure.
///
/// `top_n` controls how many candidates the engine ranks; the count always
/// comes from the best one.
///
/// # Safety
///
/// `analyzer` must be a live handle from [`kiwi_bridge_init`] and `text`
/// must point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn kiwi_bridge_analyze_token_count(
    analyzer: *mut Analyzer,
    text: *const c_char,
    top_n: c_int,
    match_options: c_int,
) -> c_int {
    clear_last_error();
    let result = (|| -> Result<usize> {
        let analyzer = analyzer_ref(analyzer)?;
        let text = required_str(text, "text")?;
        analyzer.token_count(text, &options_for(top_n, match_options))
    })();
    match result {
        Ok(count) => count_to_c_int(count),
        Err(error) => failure(error, -1),
    }
}

/// Writes the best-candidate token count of each text into `out_counts`.
///
/// Returns `0` on success, `-1` on failure. `out_counts` is only written
/// after every text analyzed successfully.
///
/// # Safety
///
/// `analyzer` must be a live handle from [`kiwi_bridge_init`]; `texts` must
/// point to `count` NUL-terminated strings; `out_counts` must point to room
/// for `count` integers.
#[no_mangle]
pub unsafe extern "C" fn kiwi_bridge_analyze_token_count_batch(
    analyzer: *mut Analyzer,
    texts: *const *const c_char,
    count: c_int,
    top_n: c_int,
    match_options: c_int,
    out_counts: *mut c_int,
) -> c_int {
    clear_last_error();
    let result = (|| -> Result<Vec<usize>> {
        if count > 0 && out_counts.is_null() {
            return Err(BridgeError::InvalidInput(
                "out_counts must not be null".to_string(),
            ));
        }
        let analyzer = analyzer_ref(analyzer)?;
        let texts = collect_texts(texts, count)?;
        analyzer.token_count_batch(&texts, &options_for(top_n, match_options))
    })();
    match result {
        Ok(counts) => {
            for (index, value) in counts.iter().enumerate() {
                *out_counts.add(index) = count_to_c_int(*value);
            }
            0
        }
        Err(error) => failure(error, -1),
    }
}

/// Sums the best-candidate token counts over `runs` repetitions of the
/// whole batch, or `-1` on failure. `runs <= 0` counts as a single run.
///
/// # Safety
///
/// `analyzer` must be a live handle from [`kiwi_bridge_init`]; `texts` must
/// point to `count` NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn kiwi_bridge_analyze_token_count_batch_runs(
    analyzer: *mut Analyzer,
    texts: *const *const c_char,
    count: c_int,
    top_n: c_int,
    match_options: c_int,
    runs: c_int,
) -> i64 {
    clear_last_error();
    let result = (|| -> Result<u64> {
        let analyzer = analyzer_ref(analyzer)?;
        let texts = collect_texts(texts, count)?;
        let runs = if runs <= 0 { 1 } else { runs as usize };
        analyzer.token_count_batch_runs(&texts, &options_for(top_n, match_options), runs)
    })();
    match result {
        Ok(total) => i64::try_from(total).unwrap_or(i64::MAX),
        Err(error) => failure(error, -1),
    }
}

/// Registers a user dictionary word and rebuilds the analyzer instance.
///
/// Returns `0` on success, `-1` on failure. A failed rebuild leaves the
/// analyzer on its previous dictionary.
///
/// # Safety
///
/// `analyzer` must be a live handle from [`kiwi_bridge_init`]; `word` and
/// `tag` must point to NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn kiwi_bridge_add_user_word(
    analyzer: *mut Analyzer,
    word: *const c_char,
    tag: *const c_char,
    score: c_float,
) -> c_int {
    clear_last_error();
    let result = (|| -> Result<()> {
        let analyzer = analyzer_mut(analyzer)?;
        let word = required_str(word, "word")?;
        let tag = required_str(tag, "tag")?;
        analyzer.add_user_word(word, tag, score)
    })();
    match result {
        Ok(()) => 0,
        Err(error) => failure(error, -1),
    }
}

/// Releases a string returned by an analyze entry point. Null is a no-op.
///
/// # Safety
///
/// `text` must be a pointer previously returned by this library and not
/// freed already.
#[no_mangle]
pub unsafe extern "C" fn kiwi_bridge_free_string(text: *mut c_char) {
    if text.is_null() {
        return;
    }
    drop(CString::from_raw(text));
}

/// Message of the last failure on the calling thread, or null when the most
/// recent call succeeded. The pointer stays valid until the next bridge
/// call on this thread; do not free it.
#[no_mangle]
pub extern "C" fn kiwi_bridge_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|message| message.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Version of the loaded Kiwi library, falling back to the bridge's own
/// version string when no library is loaded yet. Do not free the pointer.
#[no_mangle]
pub extern "C" fn kiwi_bridge_version() -> *const c_char {
    static NATIVE_VERSION: OnceLock<CString> = OnceLock::new();
    if let Some(engine) = KiwiLibrary::shared_if_loaded() {
        if let Some(version) = engine.version() {
            let cached = NATIVE_VERSION
                .get_or_init(|| CString::new(version.replace('\0', " ")).unwrap_or_default());
            return cached.as_ptr();
        }
    }
    const FALLBACK: &str = concat!("kiwi-bridge/", env!("CARGO_PKG_VERSION"), "\0");
    FALLBACK.as_ptr() as *const c_char
}
