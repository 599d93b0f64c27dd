//! Discovered functions and the name-resolver relationship between them and
//! listeners (spec §3 "Function", §9 design notes on the back-reference).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::Address;

/// A discovered function: a range of instruction addresses plus a name.
///
/// Spec §9 flags a bug in the original source: "when creating a new function
/// on a call target, one copy is stored in the function index and a
/// *different* fresh copy is stored in the entity map." This crate avoids
/// that by making `Function` reference-counted (`Arc<Function>`) and always
/// storing the *same* handle in both [`crate::store::DisasmStore`]'s
/// function index and its entity map — there is only ever one `Function`
/// value per discovered function, not two that can drift apart.
///
/// The "back-pointer to the resolver so renames fan out to listeners" from
/// spec §9 is modeled without a true ownership cycle: `Function` owns its
/// own name cell; the engine that holds both the function index and the
/// listener set is the one piece of code that renames a function and
/// notifies listeners in the same step (see `engine::run_trampoline_pass`).
#[derive(Debug)]
pub struct Function {
    pub start: Address,
    end: AtomicU64,
    name: RwLock<Arc<str>>,
}

impl Function {
    pub fn new(start: Address, end: Address, name: impl Into<Arc<str>>) -> Arc<Function> {
        Arc::new(Function {
            start,
            end: AtomicU64::new(end),
            name: RwLock::new(name.into()),
        })
    }

    /// Current end of the function's address range (inclusive).
    pub fn end(&self) -> Address {
        self.end.load(Ordering::Acquire)
    }

    /// Grows `end` monotonically (spec §3 invariant: "`end` monotonically
    /// grows during trace discovery").
    pub fn grow_end(&self, new_end: Address) {
        self.end.fetch_max(new_end, Ordering::AcqRel);
    }

    pub fn name(&self) -> Arc<str> {
        self.name.read().unwrap().clone()
    }

    pub fn rename(&self, new_name: impl Into<Arc<str>>) {
        *self.name.write().unwrap() = new_name.into();
    }

    /// Whether `addr` lies within `[start, end]` (spec §3: "the function
    /// covering an address is the one whose range contains it").
    pub fn covers(&self, addr: Address) -> bool {
        addr >= self.start && addr <= self.end()
    }
}
