//! Argument marshaling
//!
//! Converts an ordered list of strings into a single contiguous buffer of
//! NUL-terminated copies plus the start offset of each entry. libuv's
//! `uv_setup_args` expects argv strings to be adjacent in memory, so the
//! copies share one allocation instead of one `CString` per argument.

use crate::error::{BridgeError, Result};
use std::ffi::{CStr, c_char, c_int};
use std::marker::PhantomData;

/// Native argument vector owned by the bridge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentVector {
    /// Concatenated NUL-terminated arguments
    buffer: Vec<u8>,
    /// Start offset of each argument in `buffer`
    offsets: Vec<usize>,
}

impl ArgumentVector {
    /// Copy `args` into a new buffer, preserving order and bytes
    ///
    /// The buffer is reserved up front at exactly
    /// `sum(len + 1)` bytes; a failed reservation is reported instead of
    /// continuing with a missing buffer.
    pub fn marshal<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        if let Some(index) = args.iter().position(|arg| arg.as_ref().as_bytes().contains(&0)) {
            return Err(BridgeError::InteriorNul { index });
        }
        let total = buffer_size(args.iter().map(|arg| arg.as_ref().len()))
            .ok_or(BridgeError::ArgumentsTooLarge)?;
        if c_int::try_from(args.len()).is_err() {
            return Err(BridgeError::TooManyArguments(args.len()));
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(total)
            .map_err(|source| BridgeError::Allocation { bytes: total, source })?;
        let mut offsets = Vec::new();
        offsets
            .try_reserve_exact(args.len())
            .map_err(|source| BridgeError::Allocation {
                bytes: args.len() * std::mem::size_of::<usize>(),
                source,
            })?;

        for arg in args {
            offsets.push(buffer.len());
            buffer.extend_from_slice(arg.as_ref().as_bytes());
            buffer.push(0);
        }

        Ok(Self { buffer, offsets })
    }

    /// Number of arguments (`argc`)
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Total size of the backing buffer, terminators included
    pub fn byte_len(&self) -> usize {
        self.buffer.len()
    }

    /// Entry `index` including its terminator
    pub fn get(&self, index: usize) -> Option<&CStr> {
        let (start, end) = self.bounds(index)?;
        CStr::from_bytes_with_nul(&self.buffer[start..=end]).ok()
    }

    /// Entry `index` as text, without its terminator
    pub fn get_str(&self, index: usize) -> Option<&str> {
        let (start, end) = self.bounds(index)?;
        std::str::from_utf8(&self.buffer[start..end]).ok()
    }

    /// Entries in original order
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.len()).filter_map(move |i| self.get_str(i))
    }

    /// Borrow the buffer as a C `(argc, argv)` pair
    ///
    /// `argv` is followed by a NULL entry. The callee may write into the
    /// strings (node rewrites its process title in place), which is why the
    /// buffer is borrowed mutably.
    pub fn as_raw(&mut self) -> RawArgv<'_> {
        let base = self.buffer.as_mut_ptr();
        let mut ptrs: Vec<*mut c_char> = self
            .offsets
            .iter()
            // SAFETY: every offset is within `buffer`
            .map(|&offset| unsafe { base.add(offset) }.cast::<c_char>())
            .collect();
        ptrs.push(std::ptr::null_mut());
        RawArgv {
            ptrs,
            _buffer: PhantomData,
        }
    }

    /// Start offset and terminator position of entry `index`
    fn bounds(&self, index: usize) -> Option<(usize, usize)> {
        let start = *self.offsets.get(index)?;
        let end = match self.offsets.get(index + 1) {
            Some(next) => next - 1,
            None => self.buffer.len() - 1,
        };
        Some((start, end))
    }
}

/// Bytes needed for entries of the given lengths, one terminator each
fn buffer_size(lengths: impl IntoIterator<Item = usize>) -> Option<usize> {
    lengths
        .into_iter()
        .try_fold(0usize, |total, len| total.checked_add(len)?.checked_add(1))
}

/// C view of an [`ArgumentVector`], valid while the vector is borrowed
#[derive(Debug)]
pub struct RawArgv<'a> {
    ptrs: Vec<*mut c_char>,
    _buffer: PhantomData<&'a mut [u8]>,
}

impl RawArgv<'_> {
    pub fn argc(&self) -> c_int {
        // marshal() rejects counts that do not fit
        c_int::try_from(self.ptrs.len() - 1).unwrap_or(c_int::MAX)
    }

    pub fn argv(&mut self) -> *mut *mut c_char {
        self.ptrs.as_mut_ptr()
    }
}
