//! The disassembly data store (spec §4.E): entity map, interval index,
//! cross-reference edges, and function index, all observed through a shared
//! [`ListenerSet`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::entity::{DataEntryInfo, Entity};
use crate::error::{DisasmError, Result};
use crate::function::Function;
use crate::listener::ListenerSet;
use crate::Address;

#[derive(Default)]
struct StoreInner {
    /// Entities keyed by their starting address.
    entities: HashMap<Address, Entity>,
    /// Interval index: start address -> exclusive end address, kept for
    /// covering-address lookups (spec §4.E `find_entity_on_address`).
    intervals: BTreeMap<Address, Address>,
    /// Cross-reference edges: target address -> addresses that reference it
    /// (spec §3 "Cross-reference edge").
    refs: HashMap<Address, HashSet<Address>>,
    /// Discovered functions keyed by start address, shared with the
    /// corresponding `Entity::Function` handle in `entities`.
    functions: HashMap<Address, Arc<Function>>,
    /// Non-start addresses associated with a function by branch-target
    /// discovery (spec §4.F `examine_instruction`: "associate `b` with
    /// `current_fn` ... so the branch target, when traced, inherits the
    /// function"). A branch target is rarely a function's own `start`, so
    /// `functions` (keyed by exact start) can't answer "what function does
    /// this queued-but-not-yet-traced address belong to" — this map is
    /// consulted by `function_for_trace_start` for exactly that question.
    branch_membership: HashMap<Address, Arc<Function>>,
}

/// The disassembly data store: the single owner of everything the trace
/// engine has learned about an image (spec §4.E).
///
/// Shared between the worker thread and external readers via `Arc`; all
/// mutation goes through an internal `RwLock`, matching spec §5's
/// requirement that the store be "safe to query concurrently with the
/// worker that is still populating it."
pub struct DisasmStore {
    inner: RwLock<StoreInner>,
    listeners: Arc<ListenerSet>,
}

impl DisasmStore {
    pub fn new(listeners: Arc<ListenerSet>) -> Self {
        DisasmStore {
            inner: RwLock::new(StoreInner::default()),
            listeners,
        }
    }

    pub fn listeners(&self) -> &Arc<ListenerSet> {
        &self.listeners
    }

    /// Inserts a newly decoded entity. Spec §4.D "Overlap handling": an
    /// entity whose range collides with an already-indexed entity is
    /// rejected rather than overwriting it.
    pub fn insert_entity(&self, entity: Entity) -> Result<()> {
        let address = entity.address();
        let end = entity.end_exclusive();
        let mut inner = self.inner.write().unwrap();

        if let Some((&start, &existing_end)) = inner.intervals.range(..end).next_back() {
            if existing_end > address && start < end {
                return Err(DisasmError::Overlap { address });
            }
        }

        inner.intervals.insert(address, end);
        inner.entities.insert(address, entity);
        drop(inner);
        self.listeners.notify_change(address);
        Ok(())
    }

    /// An entity starting exactly at `addr`: an instruction or datum from
    /// the interval-indexed map, or (if nothing was decoded there yet) a
    /// function whose `start` is exactly `addr`.
    ///
    /// Functions are kept out of the interval index entirely: a function's
    /// own start address is also where its first instruction lives once
    /// traced, and the interval index allows only one occupant per address
    /// range (spec §4.E invariant). Synthesizing the `Entity::Function`
    /// view on read, rather than inserting it as a competing interval,
    /// keeps "the function and its entry instruction share an address"
    /// from tripping the overlap check.
    pub fn entity_on_exact_address(&self, addr: Address) -> Option<Entity> {
        let inner = self.inner.read().unwrap();
        if let Some(entity) = inner.entities.get(&addr) {
            return Some(entity.clone());
        }
        inner.functions.get(&addr).cloned().map(Entity::Function)
    }

    /// Finds the entity whose range covers `addr`, not just an entity that
    /// starts exactly there (spec §4.E `find_entity_on_address`).
    pub fn find_entity_on_address(&self, addr: Address) -> Option<Entity> {
        let inner = self.inner.read().unwrap();
        if let Some((&start, &end)) = inner.intervals.range(..=addr).next_back() {
            if addr < end {
                return inner.entities.get(&start).cloned();
            }
        }
        inner
            .functions
            .values()
            .find(|f| f.covers(addr))
            .cloned()
            .map(Entity::Function)
    }

    /// Spec §4.E `info_covering_address`: the covering entity plus every
    /// recorded reference into its range.
    pub fn info_covering_address(&self, addr: Address) -> Option<DataEntryInfo> {
        let entity = self.find_entity_on_address(addr)?;
        let start = entity.address();
        let end = entity.end_exclusive();
        let inner = self.inner.read().unwrap();
        let mut incoming_refs = Vec::new();
        for target in start..end {
            if let Some(sources) = inner.refs.get(&target) {
                incoming_refs.extend(sources.iter().copied());
            }
        }
        incoming_refs.sort_unstable();
        incoming_refs.dedup();
        Some(DataEntryInfo { entity, incoming_refs })
    }

    /// Removes a decoded entity so the address can be redecoded (spec §4.E
    /// `clear_decoded_entity`: "drop entity and detach refs pointing at
    /// it"), used when a later pass learns an address was misclassified as
    /// code vs. data, or when `reanalyze` forces a redecode.
    pub fn clear_decoded_entity(&self, addr: Address) {
        let mut inner = self.inner.write().unwrap();
        if inner.entities.remove(&addr).is_some() {
            inner.intervals.remove(&addr);
        }
        inner.refs.remove(&addr);
        drop(inner);
        self.listeners.notify_change(addr);
    }

    /// Records that `source` references `target` (spec §3 "Cross-reference
    /// edge").
    pub fn insert_reference(&self, source: Address, target: Address) {
        self.inner
            .write()
            .unwrap()
            .refs
            .entry(target)
            .or_default()
            .insert(source);
    }

    /// Registers a newly discovered function. Spec §9's two-copies bug is
    /// avoided structurally: there is only one `Arc<Function>` handle for a
    /// given function, and `entity_on_exact_address`/`find_entity_on_address`
    /// read it live from this same index rather than from a second,
    /// independently-updated copy.
    pub fn insert_function(&self, function: Arc<Function>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.functions.contains_key(&function.start) {
            return Err(DisasmError::Overlap { address: function.start });
        }
        inner.functions.insert(function.start, function.clone());
        drop(inner);
        self.listeners.notify_change(function.start);
        Ok(())
    }

    pub fn function_at(&self, start: Address) -> Option<Arc<Function>> {
        self.inner.read().unwrap().functions.get(&start).cloned()
    }

    pub fn functions(&self) -> Vec<Arc<Function>> {
        self.inner.read().unwrap().functions.values().cloned().collect()
    }

    /// Records that `addr` — not necessarily a function's own `start` — was
    /// reached by a branch from within `function` (spec §4.F
    /// `examine_instruction`'s non-call branch case). Consulted by
    /// [`Self::function_for_trace_start`] when a later, independent
    /// `disassemble_trace` call starts at `addr`.
    pub fn associate_address_with_function(&self, addr: Address, function: Arc<Function>) {
        self.inner.write().unwrap().branch_membership.insert(addr, function);
    }

    /// The function a new trace starting at `addr` should inherit: an exact
    /// function start if one is registered there, otherwise whatever
    /// function a prior trace's branch-target discovery associated with
    /// `addr` via [`Self::associate_address_with_function`].
    pub fn function_for_trace_start(&self, addr: Address) -> Option<Arc<Function>> {
        let inner = self.inner.read().unwrap();
        inner
            .functions
            .get(&addr)
            .or_else(|| inner.branch_membership.get(&addr))
            .cloned()
    }

    /// Grows a function's range and re-notes the interval without disturbing
    /// its entity-map slot (spec §3 invariant: "`end` monotonically grows
    /// during trace discovery").
    pub fn update_function_end(&self, start: Address, new_end: Address) {
        let function = match self.function_at(start) {
            Some(f) => f,
            None => return,
        };
        function.grow_end(new_end);
        self.listeners.notify_change(start);
    }

    pub fn tell_listeners(&self, addr: Address) {
        self.listeners.notify_change(addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::DataType;
    use crate::entity::DataEntry;

    fn store() -> DisasmStore {
        DisasmStore::new(Arc::new(ListenerSet::new()))
    }

    #[test]
    fn overlapping_entity_is_rejected() {
        let store = store();
        store
            .insert_entity(Entity::Data(DataEntry::new(0x1000, DataType::Dword, 4)))
            .unwrap();
        let err = store
            .insert_entity(Entity::Data(DataEntry::new(0x1002, DataType::Byte, 1)))
            .unwrap_err();
        assert!(matches!(err, DisasmError::Overlap { address: 0x1002 }));
    }

    #[test]
    fn covering_lookup_finds_entity_that_starts_earlier() {
        let store = store();
        store
            .insert_entity(Entity::Data(DataEntry::new(0x1000, DataType::Qword, 8)))
            .unwrap();
        let found = store.find_entity_on_address(0x1004).unwrap();
        assert_eq!(found.address(), 0x1000);
    }

    #[test]
    fn function_shares_one_instance_between_index_and_entity_map() {
        let store = store();
        let f = Function::new(0x2000, 0x2000, "sub_2000");
        store.insert_function(f.clone()).unwrap();
        store.update_function_end(0x2000, 0x2010);

        let from_index = store.function_at(0x2000).unwrap();
        let from_entities = store
            .entity_on_exact_address(0x2000)
            .unwrap()
            .as_function()
            .unwrap()
            .clone();
        assert_eq!(from_index.end(), 0x2010);
        assert_eq!(from_entities.end(), 0x2010);
        assert!(Arc::ptr_eq(&from_index, &from_entities));
    }

    #[test]
    fn function_entity_does_not_collide_with_its_entry_instruction() {
        let store = store();
        let f = Function::new(0x2000, 0x2000, "sub_2000");
        store.insert_function(f).unwrap();
        // The entry instruction occupies the same starting address; this
        // must not be rejected as an overlap against the function.
        store
            .insert_entity(Entity::Data(DataEntry::new(0x2000, DataType::Byte, 1)))
            .unwrap();
        assert!(matches!(
            store.entity_on_exact_address(0x2000),
            Some(Entity::Data(_))
        ));
    }

    #[test]
    fn info_covering_address_collects_incoming_refs() {
        let store = store();
        store
            .insert_entity(Entity::Data(DataEntry::new(0x3000, DataType::Dword, 4)))
            .unwrap();
        store.insert_reference(0x1000, 0x3000);
        store.insert_reference(0x1010, 0x3000);
        let info = store.info_covering_address(0x3000).unwrap();
        assert_eq!(info.incoming_refs, vec![0x1000, 0x1010]);
    }

    #[test]
    fn clear_decoded_entity_detaches_incoming_refs() {
        let store = store();
        store
            .insert_entity(Entity::Data(DataEntry::new(0x3000, DataType::Dword, 4)))
            .unwrap();
        store.insert_reference(0x1000, 0x3000);
        store.clear_decoded_entity(0x3000);

        assert!(store.entity_on_exact_address(0x3000).is_none());
        // Spec §4.E: "drop entity and detach refs pointing at it" — a fresh
        // decode at 0x3000 must start with no stale incoming references.
        store
            .insert_entity(Entity::Data(DataEntry::new(0x3000, DataType::Byte, 1)))
            .unwrap();
        let info = store.info_covering_address(0x3000).unwrap();
        assert!(info.incoming_refs.is_empty());
    }
}
