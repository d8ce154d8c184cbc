use std::ffi::CString;
use std::fmt;
use std::os::raw::c_char;

use crate::error::{BridgeError, Result};

/// Growable byte buffer for building JSON payloads handed across the C ABI.
///
/// The buffer always ends with a `NUL` byte so it can be converted into a
/// C string without copying. `len` excludes the terminator. Growth doubles
/// the capacity and reports allocation failure as an error instead of
/// aborting.
pub struct JsonBuffer {
    bytes: Vec<u8>,
}

impl JsonBuffer {
    /// Creates a buffer with room for `capacity` payload bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity.saturating_add(1))
            .map_err(|_| allocation_error())?;
        bytes.push(0);
        Ok(Self { bytes })
    }

    /// Payload length in bytes, excluding the `NUL` terminator.
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total capacity in bytes, including room for the terminator.
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    fn grow_for(&mut self, additional: usize) -> Result<()> {
        let needed = self.bytes.len().saturating_add(additional);
        if needed <= self.bytes.capacity() {
            return Ok(());
        }
        let mut target = self.bytes.capacity().max(1);
        while target < needed {
            target = target.saturating_mul(2);
        }
        self.bytes
            .try_reserve_exact(target - self.bytes.len())
            .map_err(|_| allocation_error())?;
        Ok(())
    }

    /// Appends raw bytes to the payload.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.grow_for(bytes.len())?;
        self.bytes.truncate(self.bytes.len() - 1);
        self.bytes.extend_from_slice(bytes);
        self.bytes.push(0);
        Ok(())
    }

    /// Appends a string slice verbatim.
    pub fn push_str(&mut self, text: &str) -> Result<()> {
        self.push_bytes(text.as_bytes())
    }

    /// Appends formatted output, e.g. from `format_args!`.
    ///
    /// Formats straight into the buffer; a growth failure mid-format
    /// surfaces as a serialization error rather than an abort.
    pub fn push_fmt(&mut self, arguments: fmt::Arguments<'_>) -> Result<()> {
        if let Some(text) = arguments.as_str() {
            return self.push_str(text);
        }
        let mut sink = FmtSink {
            buffer: self,
            error: None,
        };
        if fmt::write(&mut sink, arguments).is_err() {
            return Err(sink.error.take().unwrap_or_else(|| {
                BridgeError::Serialization("formatting failed".to_string())
            }));
        }
        Ok(())
    }

    /// Appends `text` with JSON string escaping applied.
    ///
    /// Escapes `"` and `\`, the short forms for backspace, form feed,
    /// newline, carriage return, and tab, and `\u00XX` for the remaining
    /// control bytes. Multi-byte UTF-8 passes through untouched.
    pub fn push_json_escaped(&mut self, text: &str) -> Result<()> {
        let bytes = text.as_bytes();
        let mut flushed = 0;
        for (index, &byte) in bytes.iter().enumerate() {
            let escape: Option<&[u8]> = match byte {
                b'"' => Some(b"\\\""),
                b'\\' => Some(b"\\\\"),
                0x08 => Some(b"\\b"),
                0x0c => Some(b"\\f"),
                b'\n' => Some(b"\\n"),
                b'\r' => Some(b"\\r"),
                b'\t' => Some(b"\\t"),
                other if other < 0x20 => {
                    self.push_bytes(&bytes[flushed..index])?;
                    self.push_fmt(format_args!("\\u{other:04x}"))?;
                    flushed = index + 1;
                    None
                }
                _ => None,
            };
            if let Some(sequence) = escape {
                self.push_bytes(&bytes[flushed..index])?;
                self.push_bytes(sequence)?;
                flushed = index + 1;
            }
        }
        self.push_bytes(&bytes[flushed..])
    }

    /// Consumes the buffer into an owned `String`.
    pub fn into_string(self) -> Result<String> {
        let mut bytes = self.bytes;
        bytes.truncate(bytes.len() - 1);
        String::from_utf8(bytes)
            .map_err(|error| BridgeError::Serialization(format!("payload is not UTF-8: {error}")))
    }

    /// Consumes the buffer into a heap-allocated C string pointer.
    ///
    /// The pointer must be released with `kiwi_bridge_free_string`.
    pub fn into_raw(self) -> Result<*mut c_char> {
        let c_string = CString::from_vec_with_nul(self.bytes).map_err(|error| {
            BridgeError::Serialization(format!("payload contains interior NUL: {error}"))
        })?;
        Ok(c_string.into_raw())
    }
}

fn allocation_error() -> BridgeError {
    BridgeError::Serialization("failed to allocate output buffer".to_string())
}

struct FmtSink<'a> {
    buffer: &'a mut JsonBuffer,
    error: Option<BridgeError>,
}

impl fmt::Write for FmtSink<'_> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        match self.buffer.push_str(text) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.error = Some(error);
                Err(fmt::Error)
            }
        }
    }
}
