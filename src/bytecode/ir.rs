use serde::{Deserialize, Serialize};

use crate::bytecode::compile_error::CompileError;

/// The address space a storage location belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    /// Data-stack word relative to slot 0.
    Global,
    /// Data-stack word relative to the current frame pointer.
    Local,
    /// Offset into the code image.
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub locale: Locale,
    pub offset: u16,
}

impl Address {
    pub fn global(offset: u16) -> Self {
        Self {
            locale: Locale::Global,
            offset,
        }
    }

    pub fn local(offset: u16) -> Self {
        Self {
            locale: Locale::Local,
            offset,
        }
    }

    pub fn code(offset: u16) -> Self {
        Self {
            locale: Locale::Code,
            offset,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let locale = match self.locale {
            Locale::Global => "global",
            Locale::Local => "local",
            Locale::Code => "code",
        };
        write!(f, "{}:{}", locale, self.offset)
    }
}

/// A complete, patched bytecode program.
///
/// Execution always starts at offset 0, which holds the global initialisers
/// followed by `CALL main; HALT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeImage {
    pub code: Vec<u8>,
    /// Entry offset of `main`.
    pub main: u16,
}

impl CodeImage {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Serialize to the object-file format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CompileError> {
        postcard::to_allocvec(self).map_err(|e| CompileError::Object(e.to_string()))
    }

    /// Deserialize an object file written by [`CodeImage::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CompileError> {
        postcard::from_bytes(bytes).map_err(|e| CompileError::Object(e.to_string()))
    }
}
