//! The console symbol table.
//!
//! Link-time entries come from the [`CONSOLE_COMMANDS`] distributed slice;
//! the crate and any dependent can contribute with the registration
//! macros, with zero heap traffic before the first lookup. The runtime
//! table is this crate's own hash table over whitespace-terminated symbol
//! keys, built lazily inside a heap allocator scope.

use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use linkme::distributed_slice;

use crate::allocators::AllocatorId;
use crate::console::args::is_delimiter;
use crate::console::command::Command;
use crate::containers::hash_table::{HashTable, Node, TableKey};
use crate::core::manager;
use crate::core::scope::AllocatorScope;

/// One registered console symbol.
pub struct ConsoleEntry {
    pub name: &'static str,
    pub command: &'static (dyn Command + Sync),
}

impl ConsoleEntry {
    pub const fn new(name: &'static str, command: &'static (dyn Command + Sync)) -> Self {
        Self { name, command }
    }
}

/// Every statically registered console symbol.
#[distributed_slice]
pub static CONSOLE_COMMANDS: [ConsoleEntry] = [..];

/// A symbol key: a byte string read up to the first delimiter. Lookup
/// keys borrow the command line itself, so a key is a raw slice rather
/// than a `&'static str`.
#[derive(Clone, Copy)]
pub(crate) struct SymbolKey {
    ptr: *const u8,
    len: usize,
}

impl SymbolKey {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            ptr: text.as_ptr(),
            len: text.len(),
        }
    }

    fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        // SAFETY: constructed from a live &str; the registry never holds a
        // key past its source line except for 'static entry names.
        (0..self.len)
            .map(move |i| unsafe { *self.ptr.add(i) })
            .take_while(|&b| !is_delimiter(b))
    }
}

impl TableKey for SymbolKey {
    /// FNV-1a, stopping at the first delimiter.
    fn hash(&self) -> u32 {
        let mut hash: u32 = 0x811c_9dc5;
        for b in self.bytes() {
            hash ^= b as u32;
            hash = hash.wrapping_mul(0x0100_0193);
        }
        hash
    }

    fn matches(&self, other: &Self) -> bool {
        self.bytes().eq(other.bytes())
    }
}

pub(crate) struct SymbolNode {
    next: *mut SymbolNode,
    key: SymbolKey,
    hash: u32,
    entry: Option<&'static ConsoleEntry>,
}

// Nodes are only reached through the registry mutex; entry references are
// 'static.
unsafe impl Send for SymbolNode {}

impl SymbolNode {
    fn with_entry(entry: &'static ConsoleEntry) -> Self {
        let key = SymbolKey::new(entry.name);
        let hash = key.hash();
        Self {
            next: std::ptr::null_mut(),
            key,
            hash,
            entry: Some(entry),
        }
    }

    pub(crate) fn entry(&self) -> &'static ConsoleEntry {
        self.entry.expect("registry node without an entry")
    }
}

impl Node for SymbolNode {
    type Key = SymbolKey;

    fn new(key: SymbolKey) -> Self {
        let hash = key.hash();
        Self {
            next: std::ptr::null_mut(),
            key,
            hash,
            entry: None,
        }
    }

    fn key(&self) -> &SymbolKey {
        &self.key
    }

    fn hash(&self) -> u32 {
        self.hash
    }

    fn next(&self) -> *mut Self {
        self.next
    }

    fn next_slot(&mut self) -> &mut *mut Self {
        &mut self.next
    }
}

const SYMBOL_TABLE_BITS: u32 = 7;

static REGISTRY: Mutex<Option<HashTable<SymbolNode>>> = Mutex::new(None);

// Table mutations only happen under this lock and never unwind partway
// (failure in here is fatal, not a panic to recover from), so a poisoned
// registry is structurally intact and still usable.
fn registry_slot() -> MutexGuard<'static, Option<HashTable<SymbolNode>>> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_table<R>(f: impl FnOnce(&mut HashTable<SymbolNode>) -> R) -> R {
    let mut slot = registry_slot();
    let table = slot.get_or_insert_with(|| {
        // Registry storage belongs on the heap no matter which allocator
        // scope triggered the first lookup.
        let _scope = AllocatorScope::new(AllocatorId::Heap);
        let mut table: HashTable<SymbolNode> = HashTable::new();
        table.set_table_size_bits(SYMBOL_TABLE_BITS);
        for entry in CONSOLE_COMMANDS.static_slice() {
            insert_entry(&mut table, entry);
        }
        table
    });
    f(table)
}

fn insert_entry(table: &mut HashTable<SymbolNode>, entry: &'static ConsoleEntry) {
    let node = manager::allocate(
        std::mem::size_of::<SymbolNode>(),
        AllocatorId::Heap,
        std::mem::align_of::<SymbolNode>(),
    )
    .cast::<SymbolNode>();
    // SAFETY: placement-construct, then hand the node to the table, whose
    // OwnedDelete policy frees it on removal.
    unsafe {
        node.as_ptr().write(SymbolNode::with_entry(entry));
        table.insert_node(node);
    }
}

/// Look up the command bound to the symbol at the head of `line`. The
/// returned command is `'static`; the registry lock is not held once this
/// returns, so commands are free to re-enter the console.
pub(crate) fn lookup(line: &str) -> Option<&'static (dyn Command + Sync)> {
    with_table(|table| {
        table
            .find(&SymbolKey::new(line), None)
            .map(|node| node.entry().command)
    })
}

/// Register a symbol at runtime. The entry must have static storage, the
/// same rule the registration macros enforce; a duplicate name shadows the
/// older registration.
pub fn register(entry: &'static ConsoleEntry) {
    with_table(|table| insert_entry(table, entry));
}

/// Remove a symbol registered statically or via [`register`]. Returns
/// whether it was present. Not thread-safe against concurrent execution
/// of the symbol being removed.
pub fn deregister(name: &str) -> bool {
    with_table(|table| match table.extract(&SymbolKey::new(name)) {
        Some(node) => {
            // SAFETY: extracted from the table; disposal mirrors the
            // table's own OwnedDelete policy.
            unsafe {
                std::ptr::drop_in_place(node.as_ptr());
                manager::free(node.as_ptr().cast());
            }
            true
        }
        None => false,
    })
}

/// Drop the runtime symbol table, returning its nodes and bucket array to
/// the memory manager so a shutdown leak audit runs clean. Statically
/// registered entries reappear on the next lookup; dynamic registrations
/// are forgotten.
pub fn shut_down() {
    let mut slot = registry_slot();
    *slot = None;
}

/// Visit every registered symbol in table order.
pub(crate) fn for_each_symbol(mut f: impl FnMut(&'static ConsoleEntry)) {
    with_table(|table| {
        for node in table.iter() {
            f(node.entry());
        }
    });
}
