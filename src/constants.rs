//! Constants mirrored from Kiwi C API option and flag values.

/// Build option: integrate allomorph variants.
pub const KIWI_BUILD_INTEGRATE_ALLOMORPH: i32 = 1;
/// Build option: load bundled default dictionary.
pub const KIWI_BUILD_LOAD_DEFAULT_DICT: i32 = 2;
/// Build option: load typo dictionary.
pub const KIWI_BUILD_LOAD_TYPO_DICT: i32 = 4;
/// Build option: load multi-word dictionary.
pub const KIWI_BUILD_LOAD_MULTI_DICT: i32 = 8;
/// Default build option mask.
pub const KIWI_BUILD_DEFAULT: i32 = 15;
/// Build option: CoNg model type.
pub const KIWI_BUILD_MODEL_TYPE_CONG: i32 = 0x0400;
/// Default build options with the CoNg model, used when callers pass the
/// zero sentinel.
pub const KIWI_BUILD_DEFAULT_WITH_CONG: i32 = KIWI_BUILD_DEFAULT | KIWI_BUILD_MODEL_TYPE_CONG;

/// Match option: URL detection.
pub const KIWI_MATCH_URL: i32 = 1;
/// Match option: email detection.
pub const KIWI_MATCH_EMAIL: i32 = 2;
/// Match option: hashtag detection.
pub const KIWI_MATCH_HASHTAG: i32 = 4;
/// Match option: mention detection.
pub const KIWI_MATCH_MENTION: i32 = 8;
/// Match option: serial number detection.
pub const KIWI_MATCH_SERIAL: i32 = 16;
/// Match option: normalize coda.
pub const KIWI_MATCH_NORMALIZE_CODA: i32 = 1 << 16;
/// Match option: split complex morphemes.
pub const KIWI_MATCH_SPLIT_COMPLEX: i32 = 1 << 22;
/// Match option: z-coda handling.
pub const KIWI_MATCH_Z_CODA: i32 = 1 << 23;

/// Common default match options.
pub const KIWI_MATCH_ALL: i32 = KIWI_MATCH_URL
    | KIWI_MATCH_EMAIL
    | KIWI_MATCH_HASHTAG
    | KIWI_MATCH_MENTION
    | KIWI_MATCH_SERIAL
    | KIWI_MATCH_Z_CODA;
/// `KIWI_MATCH_ALL` with coda normalization, used when callers pass the zero
/// sentinel.
pub const KIWI_MATCH_ALL_WITH_NORMALIZING: i32 = KIWI_MATCH_ALL | KIWI_MATCH_NORMALIZE_CODA;

/// Dialect mask: standard language only.
pub const KIWI_DIALECT_STANDARD: i32 = 0;
/// Dialect mask containing all supported dialect flags.
pub const KIWI_DIALECT_ALL: i32 = (1 << 10) - 1;
