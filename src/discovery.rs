use std::env;
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// Environment override for the dynamic library path.
pub(crate) const LIBRARY_PATH_ENV: &str = "KIWI_BRIDGE_LIBRARY_PATH";
/// Deprecated alias kept for callers of earlier releases.
pub(crate) const LIBRARY_PATH_ENV_LEGACY: &str = "KIWI_LIBRARY_PATH";
/// Environment override for the model directory path.
pub(crate) const MODEL_PATH_ENV: &str = "KIWI_BRIDGE_MODEL_PATH";
/// Deprecated alias kept for callers of earlier releases.
pub(crate) const MODEL_PATH_ENV_LEGACY: &str = "KIWI_MODEL_PATH";

fn env_path(name: &str) -> Option<PathBuf> {
    let value = env::var_os(name)?;
    if value.is_empty() {
        return None;
    }
    Some(PathBuf::from(value))
}

pub(crate) fn library_path_override() -> Option<PathBuf> {
    env_path(LIBRARY_PATH_ENV).or_else(|| env_path(LIBRARY_PATH_ENV_LEGACY))
}

pub(crate) fn model_path_override() -> Option<PathBuf> {
    env_path(MODEL_PATH_ENV).or_else(|| env_path(MODEL_PATH_ENV_LEGACY))
}

/// Resolves the model directory: explicit argument first, then the
/// environment overrides, otherwise initialization cannot proceed.
pub(crate) fn resolve_model_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.as_os_str().is_empty() {
            return Ok(path.to_path_buf());
        }
    }
    if let Some(path) = model_path_override() {
        return Ok(path);
    }
    Err(BridgeError::Init(format!(
        "model path is required; pass an explicit path or set {MODEL_PATH_ENV} (legacy: {MODEL_PATH_ENV_LEGACY})"
    )))
}

pub(crate) fn default_library_candidates() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["kiwi.dll", "libkiwi.dll"]
    }
    #[cfg(target_os = "macos")]
    {
        &[
            "libkiwi.dylib",
            "kiwi.dylib",
            "/usr/local/lib/libkiwi.dylib",
            "/opt/homebrew/lib/libkiwi.dylib",
            "@rpath/libkiwi.dylib",
            "@loader_path/libkiwi.dylib",
            "@loader_path/../Frameworks/libkiwi.dylib",
            "Kiwi.framework/Kiwi",
        ]
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        &[
            "libkiwi.so",
            "kiwi.so",
            "./libkiwi.so",
            "/usr/local/lib/libkiwi.so",
            "/usr/lib/libkiwi.so",
        ]
    }
}

pub(crate) fn discover_default_library_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        if let Some(local_app_data) = env::var_os("LOCALAPPDATA") {
            let path = PathBuf::from(local_app_data)
                .join("kiwi")
                .join("lib")
                .join("kiwi.dll");
            if path.exists() {
                return Some(path);
            }
        }
        if let Some(user_profile) = env::var_os("USERPROFILE") {
            let path = PathBuf::from(user_profile)
                .join("AppData")
                .join("Local")
                .join("kiwi")
                .join("lib")
                .join("kiwi.dll");
            if path.exists() {
                return Some(path);
            }
        }
        let well_known = [
            PathBuf::from("C:\\kiwi\\lib\\kiwi.dll"),
            PathBuf::from("C:\\Program Files\\Kiwi\\lib\\kiwi.dll"),
        ];
        for path in well_known {
            if path.exists() {
                return Some(path);
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = env::var_os("HOME") {
            let path = PathBuf::from(home)
                .join(".local")
                .join("kiwi")
                .join("lib")
                .join("libkiwi.dylib");
            if path.exists() {
                return Some(path);
            }
        }

        let well_known = [
            PathBuf::from("/usr/local/lib/libkiwi.dylib"),
            PathBuf::from("/opt/homebrew/lib/libkiwi.dylib"),
        ];
        for path in well_known {
            if path.exists() {
                return Some(path);
            }
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        if let Some(home) = env::var_os("HOME") {
            let path = PathBuf::from(home)
                .join(".local")
                .join("kiwi")
                .join("lib")
                .join("libkiwi.so");
            if path.exists() {
                return Some(path);
            }
        }

        let well_known = [
            PathBuf::from("/usr/local/lib/libkiwi.so"),
            PathBuf::from("/usr/lib/libkiwi.so"),
        ];
        for path in well_known {
            if path.exists() {
                return Some(path);
            }
        }
    }

    None
}
