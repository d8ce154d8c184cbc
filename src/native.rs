use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_float, c_int, c_void};
use std::path::Path;
use std::ptr;

use crate::config::{
    KiwiAnalyzeOption, KiwiBuilderHandle, KiwiHandle, KiwiPretokenizedHandle, KiwiResHandle,
    KiwiTypoHandle,
};
use crate::error::{BridgeError, Result};

type FnKiwiVersion = unsafe extern "C" fn() -> *const c_char;
type FnKiwiError = unsafe extern "C" fn() -> *const c_char;
type FnKiwiClearError = unsafe extern "C" fn();
type FnKiwiBuilderInit =
    unsafe extern "C" fn(*const c_char, c_int, c_int, c_int) -> KiwiBuilderHandle;
type FnKiwiBuilderClose = unsafe extern "C" fn(KiwiBuilderHandle) -> c_int;
type FnKiwiBuilderAddWord =
    unsafe extern "C" fn(KiwiBuilderHandle, *const c_char, *const c_char, c_float) -> c_int;
type FnKiwiBuilderBuild =
    unsafe extern "C" fn(KiwiBuilderHandle, KiwiTypoHandle, c_float) -> KiwiHandle;
type FnKiwiClose = unsafe extern "C" fn(KiwiHandle) -> c_int;
type FnKiwiAnalyze = unsafe extern "C" fn(
    KiwiHandle,
    *const c_char,
    c_int,
    KiwiAnalyzeOption,
    KiwiPretokenizedHandle,
) -> KiwiResHandle;
type FnKiwiResSize = unsafe extern "C" fn(KiwiResHandle) -> c_int;
type FnKiwiResProb = unsafe extern "C" fn(KiwiResHandle, c_int) -> c_float;
type FnKiwiResWordNum = unsafe extern "C" fn(KiwiResHandle, c_int) -> c_int;
type FnKiwiResForm = unsafe extern "C" fn(KiwiResHandle, c_int, c_int) -> *const c_char;
type FnKiwiResTag = unsafe extern "C" fn(KiwiResHandle, c_int, c_int) -> *const c_char;
type FnKiwiResPosition = unsafe extern "C" fn(KiwiResHandle, c_int, c_int) -> c_int;
type FnKiwiResLength = unsafe extern "C" fn(KiwiResHandle, c_int, c_int) -> c_int;
type FnKiwiResWordPosition = unsafe extern "C" fn(KiwiResHandle, c_int, c_int) -> c_int;
type FnKiwiResSentPosition = unsafe extern "C" fn(KiwiResHandle, c_int, c_int) -> c_int;
type FnKiwiResScore = unsafe extern "C" fn(KiwiResHandle, c_int, c_int) -> c_float;
type FnKiwiResTypoCost = unsafe extern "C" fn(KiwiResHandle, c_int, c_int) -> c_float;
type FnKiwiResClose = unsafe extern "C" fn(KiwiResHandle) -> c_int;

/// Resolved function table for the subset of the Kiwi C API the bridge uses.
///
/// Every field is required; loading fails if any symbol is missing.
#[derive(Clone, Copy)]
pub(crate) struct KiwiApi {
    pub(crate) kiwi_version: FnKiwiVersion,
    pub(crate) kiwi_error: FnKiwiError,
    pub(crate) kiwi_clear_error: FnKiwiClearError,
    pub(crate) kiwi_builder_init: FnKiwiBuilderInit,
    pub(crate) kiwi_builder_close: FnKiwiBuilderClose,
    pub(crate) kiwi_builder_add_word: FnKiwiBuilderAddWord,
    pub(crate) kiwi_builder_build: FnKiwiBuilderBuild,
    pub(crate) kiwi_close: FnKiwiClose,
    pub(crate) kiwi_analyze: FnKiwiAnalyze,
    pub(crate) kiwi_res_size: FnKiwiResSize,
    pub(crate) kiwi_res_prob: FnKiwiResProb,
    pub(crate) kiwi_res_word_num: FnKiwiResWordNum,
    pub(crate) kiwi_res_form: FnKiwiResForm,
    pub(crate) kiwi_res_tag: FnKiwiResTag,
    pub(crate) kiwi_res_position: FnKiwiResPosition,
    pub(crate) kiwi_res_length: FnKiwiResLength,
    pub(crate) kiwi_res_word_position: FnKiwiResWordPosition,
    pub(crate) kiwi_res_sent_position: FnKiwiResSentPosition,
    pub(crate) kiwi_res_score: FnKiwiResScore,
    pub(crate) kiwi_res_typo_cost: FnKiwiResTypoCost,
    pub(crate) kiwi_res_close: FnKiwiResClose,
}

impl KiwiApi {
    pub(crate) unsafe fn load(library: &DynamicLibrary) -> Result<Self> {
        Ok(Self {
            kiwi_version: library.load_symbol("kiwi_version")?,
            kiwi_error: library.load_symbol("kiwi_error")?,
            kiwi_clear_error: library.load_symbol("kiwi_clear_error")?,
            kiwi_builder_init: library.load_symbol("kiwi_builder_init")?,
            kiwi_builder_close: library.load_symbol("kiwi_builder_close")?,
            kiwi_builder_add_word: library.load_symbol("kiwi_builder_add_word")?,
            kiwi_builder_build: library.load_symbol("kiwi_builder_build")?,
            kiwi_close: library.load_symbol("kiwi_close")?,
            kiwi_analyze: library.load_symbol("kiwi_analyze")?,
            kiwi_res_size: library.load_symbol("kiwi_res_size")?,
            kiwi_res_prob: library.load_symbol("kiwi_res_prob")?,
            kiwi_res_word_num: library.load_symbol("kiwi_res_word_num")?,
            kiwi_res_form: library.load_symbol("kiwi_res_form")?,
            kiwi_res_tag: library.load_symbol("kiwi_res_tag")?,
            kiwi_res_position: library.load_symbol("kiwi_res_position")?,
            kiwi_res_length: library.load_symbol("kiwi_res_length")?,
            kiwi_res_word_position: library.load_symbol("kiwi_res_word_position")?,
            kiwi_res_sent_position: library.load_symbol("kiwi_res_sent_position")?,
            kiwi_res_score: library.load_symbol("kiwi_res_score")?,
            kiwi_res_typo_cost: library.load_symbol("kiwi_res_typo_cost")?,
            kiwi_res_close: library.load_symbol("kiwi_res_close")?,
        })
    }
}

/// Engine operations the runtime layer depends on.
///
/// The production implementation dispatches into a dynamically loaded Kiwi
/// library; tests substitute a scripted engine. Raw handles stay opaque so
/// only this module touches symbol resolution.
pub(crate) trait EngineApi: Send + Sync {
    fn version(&self) -> Option<String>;
    fn last_error(&self) -> Option<String>;
    fn clear_error(&self);
    fn builder_init(
        &self,
        model_path: &CStr,
        num_threads: c_int,
        options: c_int,
        init_dialect: c_int,
    ) -> KiwiBuilderHandle;
    fn builder_close(&self, builder: KiwiBuilderHandle) -> c_int;
    fn builder_add_word(
        &self,
        builder: KiwiBuilderHandle,
        word: &CStr,
        tag: &CStr,
        score: c_float,
    ) -> c_int;
    fn builder_build(&self, builder: KiwiBuilderHandle) -> KiwiHandle;
    fn close(&self, instance: KiwiHandle) -> c_int;
    fn analyze(
        &self,
        instance: KiwiHandle,
        text: &CStr,
        top_n: c_int,
        options: KiwiAnalyzeOption,
    ) -> KiwiResHandle;
    fn res_size(&self, result: KiwiResHandle) -> c_int;
    fn res_prob(&self, result: KiwiResHandle, candidate: c_int) -> c_float;
    fn res_word_num(&self, result: KiwiResHandle, candidate: c_int) -> c_int;
    fn res_form(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> Option<String>;
    fn res_tag(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> Option<String>;
    fn res_position(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int;
    fn res_length(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int;
    fn res_word_position(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int;
    fn res_sent_position(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int;
    fn res_score(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_float;
    fn res_typo_cost(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_float;
    fn res_close(&self, result: KiwiResHandle) -> c_int;
}

/// Production [`EngineApi`] backed by a dynamically loaded Kiwi library.
///
/// The library handle must outlive the function table, so the two are owned
/// together and the handle field stays alive purely for its `Drop`.
pub(crate) struct LoadedEngine {
    _library: DynamicLibrary,
    api: KiwiApi,
}

// The raw library handle and function pointers are never mutated after load
// and the underlying Kiwi symbols are callable from any thread.
unsafe impl Send for LoadedEngine {}
unsafe impl Sync for LoadedEngine {}

impl LoadedEngine {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let library = DynamicLibrary::open(path)?;
        let api = unsafe { KiwiApi::load(&library)? };
        Ok(Self {
            _library: library,
            api,
        })
    }
}

impl EngineApi for LoadedEngine {
    fn version(&self) -> Option<String> {
        let pointer = unsafe { (self.api.kiwi_version)() };
        if pointer.is_null() {
            return None;
        }
        Some(cstr_to_string(pointer))
    }

    fn last_error(&self) -> Option<String> {
        let pointer = unsafe { (self.api.kiwi_error)() };
        if pointer.is_null() {
            return None;
        }
        let message = unsafe { CStr::from_ptr(pointer) }
            .to_string_lossy()
            .trim()
            .to_string();
        if message.is_empty() {
            None
        } else {
            Some(message)
        }
    }

    fn clear_error(&self) {
        unsafe { (self.api.kiwi_clear_error)() }
    }

    fn builder_init(
        &self,
        model_path: &CStr,
        num_threads: c_int,
        options: c_int,
        init_dialect: c_int,
    ) -> KiwiBuilderHandle {
        unsafe {
            (self.api.kiwi_builder_init)(model_path.as_ptr(), num_threads, options, init_dialect)
        }
    }

    fn builder_close(&self, builder: KiwiBuilderHandle) -> c_int {
        unsafe { (self.api.kiwi_builder_close)(builder) }
    }

    fn builder_add_word(
        &self,
        builder: KiwiBuilderHandle,
        word: &CStr,
        tag: &CStr,
        score: c_float,
    ) -> c_int {
        unsafe { (self.api.kiwi_builder_add_word)(builder, word.as_ptr(), tag.as_ptr(), score) }
    }

    fn builder_build(&self, builder: KiwiBuilderHandle) -> KiwiHandle {
        unsafe { (self.api.kiwi_builder_build)(builder, ptr::null_mut(), 0.0) }
    }

    fn close(&self, instance: KiwiHandle) -> c_int {
        unsafe { (self.api.kiwi_close)(instance) }
    }

    fn analyze(
        &self,
        instance: KiwiHandle,
        text: &CStr,
        top_n: c_int,
        options: KiwiAnalyzeOption,
    ) -> KiwiResHandle {
        unsafe {
            (self.api.kiwi_analyze)(instance, text.as_ptr(), top_n, options, ptr::null_mut())
        }
    }

    fn res_size(&self, result: KiwiResHandle) -> c_int {
        unsafe { (self.api.kiwi_res_size)(result) }
    }

    fn res_prob(&self, result: KiwiResHandle, candidate: c_int) -> c_float {
        unsafe { (self.api.kiwi_res_prob)(result, candidate) }
    }

    fn res_word_num(&self, result: KiwiResHandle, candidate: c_int) -> c_int {
        unsafe { (self.api.kiwi_res_word_num)(result, candidate) }
    }

    fn res_form(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> Option<String> {
        let pointer = unsafe { (self.api.kiwi_res_form)(result, candidate, token) };
        if pointer.is_null() {
            return None;
        }
        Some(cstr_to_string(pointer))
    }

    fn res_tag(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> Option<String> {
        let pointer = unsafe { (self.api.kiwi_res_tag)(result, candidate, token) };
        if pointer.is_null() {
            return None;
        }
        Some(cstr_to_string(pointer))
    }

    fn res_position(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int {
        unsafe { (self.api.kiwi_res_position)(result, candidate, token) }
    }

    fn res_length(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int {
        unsafe { (self.api.kiwi_res_length)(result, candidate, token) }
    }

    fn res_word_position(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int {
        unsafe { (self.api.kiwi_res_word_position)(result, candidate, token) }
    }

    fn res_sent_position(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_int {
        unsafe { (self.api.kiwi_res_sent_position)(result, candidate, token) }
    }

    fn res_score(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_float {
        unsafe { (self.api.kiwi_res_score)(result, candidate, token) }
    }

    fn res_typo_cost(&self, result: KiwiResHandle, candidate: c_int, token: c_int) -> c_float {
        unsafe { (self.api.kiwi_res_typo_cost)(result, candidate, token) }
    }

    fn res_close(&self, result: KiwiResHandle) -> c_int {
        unsafe { (self.api.kiwi_res_close)(result) }
    }
}

pub(crate) fn api_error(engine: &dyn EngineApi, fallback: &str) -> BridgeError {
    match engine.last_error() {
        Some(message) => BridgeError::Api(message),
        None => BridgeError::Api(fallback.to_string()),
    }
}

pub(crate) fn init_error(engine: &dyn EngineApi, fallback: &str) -> BridgeError {
    match engine.last_error() {
        Some(message) => BridgeError::Init(message),
        None => BridgeError::Init(fallback.to_string()),
    }
}

pub(crate) fn cstr_to_string(pointer: *const c_char) -> String {
    if pointer.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(pointer) }
        .to_string_lossy()
        .to_string()
}

#[derive(Debug)]
pub(crate) struct DynamicLibrary {
    handle: *mut c_void,
}

impl DynamicLibrary {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_string = path.as_ref().to_string_lossy().to_string();
        let path_c = CString::new(path_string.clone())?;
        let handle = unsafe { platform_open(path_c.as_ptr()) };
        if handle.is_null() {
            return Err(BridgeError::LibraryLoad(format!(
                "{} ({})",
                path_string,
                platform_last_error()
            )));
        }
        Ok(Self { handle })
    }

    pub(crate) unsafe fn load_symbol<T: Copy>(&self, symbol_name: &str) -> Result<T> {
        let symbol_c = CString::new(symbol_name)?;
        let symbol_ptr = platform_symbol(self.handle, symbol_c.as_ptr());
        if symbol_ptr.is_null() {
            return Err(BridgeError::SymbolLoad(format!(
                "{} ({})",
                symbol_name,
                platform_last_error()
            )));
        }
        Ok(std::mem::transmute_copy::<*mut c_void, T>(&symbol_ptr))
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        if self.handle.is_null() {
            return;
        }
        unsafe {
            platform_close(self.handle);
        }
        self.handle = ptr::null_mut();
    }
}

#[cfg(target_os = "windows")]
#[link(name = "kernel32")]
extern "system" {
    fn LoadLibraryA(lp_lib_file_name: *const c_char) -> *mut c_void;
    fn GetProcAddress(h_module: *mut c_void, lp_proc_name: *const c_char) -> *mut c_void;
    fn FreeLibrary(h_lib_module: *mut c_void) -> i32;
    fn GetLastError() -> u32;
}

#[cfg(target_os = "windows")]
unsafe fn platform_open(path: *const c_char) -> *mut c_void {
    LoadLibraryA(path)
}

#[cfg(target_os = "windows")]
unsafe fn platform_symbol(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    GetProcAddress(handle, symbol)
}

#[cfg(target_os = "windows")]
unsafe fn platform_close(handle: *mut c_void) {
    let _ = FreeLibrary(handle);
}

#[cfg(target_os = "windows")]
fn platform_last_error() -> String {
    format!("GetLastError={}", unsafe { GetLastError() })
}

#[cfg(target_os = "linux")]
#[link(name = "dl")]
extern "C" {
    fn dlopen(filename: *const c_char, flags: c_int) -> *mut c_void;
    fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
    fn dlclose(handle: *mut c_void) -> c_int;
    fn dlerror() -> *const c_char;
}

#[cfg(target_os = "macos")]
extern "C" {
    fn dlopen(filename: *const c_char, flags: c_int) -> *mut c_void;
    fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
    fn dlclose(handle: *mut c_void) -> c_int;
    fn dlerror() -> *const c_char;
}

#[cfg(unix)]
unsafe fn platform_open(path: *const c_char) -> *mut c_void {
    const RTLD_NOW: c_int = 2;
    const RTLD_LOCAL: c_int = 0;
    dlopen(path, RTLD_NOW | RTLD_LOCAL)
}

#[cfg(unix)]
unsafe fn platform_symbol(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    dlsym(handle, symbol)
}

#[cfg(unix)]
unsafe fn platform_close(handle: *mut c_void) {
    let _ = dlclose(handle);
}

#[cfg(unix)]
fn platform_last_error() -> String {
    let pointer = unsafe { dlerror() };
    if pointer.is_null() {
        "unknown error".to_string()
    } else {
        let full = unsafe { CStr::from_ptr(pointer) }
            .to_string_lossy()
            .to_string();
        full.split(": tried:").next().unwrap_or(&full).to_string()
    }
}

#[cfg(test)]
mod native_tests {
    use super::{cstr_to_string, DynamicLibrary};
    use crate::error::BridgeError;
    use std::ffi::CString;
    use std::ptr;

    #[test]
    fn open_missing_library_reports_path_and_reason() {
        let error = DynamicLibrary::open("/nonexistent/libkiwi-bridge-test.so")
            .expect_err("expected load failure");
        match error {
            BridgeError::LibraryLoad(message) => {
                assert!(message.contains("/nonexistent/libkiwi-bridge-test.so"));
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn cstr_to_string_handles_null_pointer() {
        assert_eq!(cstr_to_string(ptr::null()), "");
    }

    #[test]
    fn cstr_to_string_copies_content() {
        let source = CString::new("kiwi 0.21.0").expect("no interior NUL");
        assert_eq!(cstr_to_string(source.as_ptr()), "kiwi 0.21.0");
    }
}
