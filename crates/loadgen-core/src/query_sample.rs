//! Value types shared across the issue/complete boundary.
//!
//! These are plain `repr(C)`/`repr(transparent)` values so they can cross an
//! FFI edge unchanged.

use std::fmt;

/// Correlation handle assigned by the issuer to one in-flight query.
///
/// Only distinct among queries that are outstanding at the same time.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct QueryId(usize);

impl QueryId {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl From<usize> for QueryId {
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of one unit of inference input in the sample library.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct QuerySample(u64);

impl QuerySample {
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u64 {
        self.0
    }
}

impl From<u64> for QuerySample {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

impl fmt::Display for QuerySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Describes the output of one completed sample.
///
/// `data` is the address of a buffer owned by the issuer; the descriptor does
/// not keep it alive. The issuer must keep the buffer valid until the
/// response has been consumed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuerySampleResponse {
    pub data: usize,
    pub size: usize,
}

impl QuerySampleResponse {
    pub const fn new(data: usize, size: usize) -> Self {
        Self { data, size }
    }

    /// Points the response at `buffer` without taking ownership of it.
    pub fn for_buffer(buffer: &[u8]) -> Self {
        Self {
            data: buffer.as_ptr() as usize,
            size: buffer.len(),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }
}
