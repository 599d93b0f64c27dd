//! The decoded entities the disassembly data store indexes by address
//! (spec §3 "Data entry", "Entity map").

use std::sync::Arc;

use crate::enums::DataType;
use crate::function::Function;
use crate::instruction::Instruction;
use crate::Address;

/// A decoded datum at an address (spec §3 "Data entry").
#[derive(Clone, Debug)]
pub struct DataEntry {
    pub address: Address,
    pub ty: DataType,
    pub len: usize,
}

impl DataEntry {
    pub fn new(address: Address, ty: DataType, len: usize) -> Self {
        DataEntry { address, ty, len }
    }
}

/// One decoded thing at an address: an instruction, a datum, or a function.
///
/// `Entity::Function` is always the same `Arc<Function>` handle held by
/// `DisasmStore`'s function index (spec §9's "store the same function
/// instance in both places" fix) — there is exactly one `Function` value
/// per discovered function, never a second copy that can drift out of sync.
#[derive(Clone, Debug)]
pub enum Entity {
    Instruction(Instruction),
    Data(DataEntry),
    Function(Arc<Function>),
    /// A length-1 "Unknown opcode: XX" pseudo-entity (spec §4.D "Failure",
    /// §7 "DecodeMiss ... surfaces as an 'unknown opcode' pseudo-entity in
    /// one-shot mode"). Produced only by [`crate::decoder::Decoder::decode_or_unknown`];
    /// the trace engine never constructs one of these, and `DisasmStore`
    /// never holds one (spec scenario 4: a miss there is a logged,
    /// no-entity-inserted trace stop instead).
    Unknown { address: Address, byte: u8 },
}

impl Entity {
    pub fn address(&self) -> Address {
        match self {
            Entity::Instruction(i) => i.address,
            Entity::Data(d) => d.address,
            Entity::Function(f) => f.start,
            Entity::Unknown { address, .. } => *address,
        }
    }

    /// The exclusive end of this entity's byte range, `address + len`.
    pub fn end_exclusive(&self) -> Address {
        match self {
            Entity::Instruction(i) => self.address() + i.size as u64,
            Entity::Data(d) => self.address() + d.len.max(1) as u64,
            // Functions are never inserted into the interval index (see
            // `DisasmStore::insert_function`), so this is only descriptive
            // for callers matching on a synthesized `Entity::Function`, not
            // load-bearing for overlap detection.
            Entity::Function(f) => f.end() + 1,
            Entity::Unknown { address, .. } => address + 1,
        }
    }

    pub fn as_instruction(&self) -> Option<&Instruction> {
        match self {
            Entity::Instruction(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<Function>> {
        match self {
            Entity::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// A bundle returned by `DisasmStore::info_covering_address`: the entity
/// covering an address plus everything that references it (spec §4.E
/// `info_covering_address`).
#[derive(Clone, Debug)]
pub struct DataEntryInfo {
    pub entity: Entity,
    pub incoming_refs: Vec<Address>,
}
