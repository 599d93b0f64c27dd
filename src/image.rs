//! The `Image` interface consumed by the trace engine (spec §6).
//!
//! Loading PE (or other container) files is explicitly out of scope (spec
//! §1) — this module defines only the seam, plus a minimal in-memory
//! implementation used by tests and by callers who already have a flat
//! buffer and a base address and don't need a real loader.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{DisasmError, Result};
use crate::Address;

/// A scoped lock token for a byte sequence acquired from an [`Image`].
///
/// Spec §5: "Byte-sequence acquisition is a scoped resource: each
/// `get_byte_sequence(addr, lock=true)` must be released on every exit path
/// ... acquire/release is the only way the image enforces read atomicity
/// against patch operations from scripts." Modeled as an RAII guard so
/// "release on every exit path" falls out of normal `Drop` semantics instead
/// of needing to be hand-written at every call site.
pub struct ByteSequence<'a> {
    bytes: &'a [u8],
    _lock: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> ByteSequence<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteSequence { bytes, _lock: None }
    }

    pub fn with_release(bytes: &'a [u8], release: impl FnOnce() + 'a) -> Self {
        ByteSequence {
            bytes,
            _lock: Some(Box::new(release)),
        }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// The image interface consumed by the decoder and trace engine (spec §6).
///
/// A real implementation backs this with a loaded PE (or other container)
/// file; that loader is out of scope here (spec §1) and is treated as an
/// opaque collaborator behind this trait.
pub trait Image: Send + Sync {
    /// Acquires a byte sequence starting at `addr`. When `lock` is true the
    /// returned guard should block concurrent patch operations against the
    /// same range until dropped (spec §5).
    fn get_byte_sequence(&self, addr: Address, lock: bool) -> Result<ByteSequence<'_>>;

    /// The image's code entry point, in virtual-address space.
    fn code_entry_point_mem(&self) -> Address;

    fn is_valid_address(&self, addr: Address) -> bool;

    fn is_code_address(&self, addr: Address) -> bool;

    fn to_mem_address(&self, file_offset: usize) -> Address;

    /// Imported symbols: virtual address -> name (spec §4.F initialization:
    /// "Register every import as a named function at its import address").
    fn get_imports(&self) -> Vec<(Address, Arc<str>)>;

    /// Section metadata, `(name, virtual address range)`.
    fn get_sections(&self) -> Vec<(Arc<str>, Range<Address>)>;
}

/// A minimal flat in-memory `Image`: a single code section mapped at
/// `base`, with an optional import table appended as non-code data.
///
/// Not a PE loader (that's out of scope, spec §1) — this exists so tests
/// and small embedders can drive the trace engine without one.
pub struct InMemoryImage {
    base: Address,
    bytes: Vec<u8>,
    entry_point: Address,
    imports: Vec<(Address, Arc<str>)>,
    code_range: Range<Address>,
}

impl InMemoryImage {
    pub fn new(base: Address, bytes: Vec<u8>, entry_point: Address) -> Self {
        let len = bytes.len() as u64;
        InMemoryImage {
            base,
            bytes,
            entry_point,
            imports: Vec::new(),
            code_range: base..(base + len),
        }
    }

    pub fn with_import(mut self, addr: Address, name: impl Into<Arc<str>>) -> Self {
        self.imports.push((addr, name.into()));
        self
    }

    fn offset_of(&self, addr: Address) -> Option<usize> {
        if addr >= self.base && addr < self.base + self.bytes.len() as u64 {
            Some((addr - self.base) as usize)
        } else {
            None
        }
    }
}

impl Image for InMemoryImage {
    fn get_byte_sequence(&self, addr: Address, _lock: bool) -> Result<ByteSequence<'_>> {
        let offset = self.offset_of(addr).ok_or(DisasmError::InvalidAddress { address: addr })?;
        Ok(ByteSequence::new(&self.bytes[offset..]))
    }

    fn code_entry_point_mem(&self) -> Address {
        self.entry_point
    }

    fn is_valid_address(&self, addr: Address) -> bool {
        self.offset_of(addr).is_some() || self.imports.iter().any(|(a, _)| *a == addr)
    }

    fn is_code_address(&self, addr: Address) -> bool {
        self.code_range.contains(&addr)
    }

    fn to_mem_address(&self, file_offset: usize) -> Address {
        self.base + file_offset as u64
    }

    fn get_imports(&self) -> Vec<(Address, Arc<str>)> {
        self.imports.clone()
    }

    fn get_sections(&self) -> Vec<(Arc<str>, Range<Address>)> {
        vec![(Arc::from("code"), self.code_range.clone())]
    }
}
