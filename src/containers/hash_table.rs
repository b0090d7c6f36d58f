//! Hash table with embedded singly-linked bucket lists.
//!
//! This table never reallocates and never copies nodes. Each bucket is the
//! head of a list threaded through the nodes themselves; a node type
//! supplies its own key, cached hash, and next pointer. The table can hold
//! duplicate keys (`insert_node`) or act as a set/map (`insert_unique`).
//! Buckets come inline or from one dynamic allocation sized by
//! `set_table_size_bits`.
//!
//! Bucket selection uses the *high* bits of the 32-bit hash
//! (`hash >> (32 - bits)`) so tables stay spread even when a key type's
//! hash is weak in the low bits.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::allocators::AllocatorId;
use crate::core::manager;

/// Number of bits in a table hash.
pub const HASH_BITS: u32 = 32;

/// Key contract: a 32-bit hash and an equivalence test. Equivalence may be
/// cheaper than full equality (string keys compare pointers first).
pub trait TableKey {
    fn hash(&self) -> u32;
    fn matches(&self, other: &Self) -> bool;
}

/// Multiplier from Linux's hash.h; spreads integer keys into the high bits
/// the bucket index is taken from.
const INTEGER_HASH_MULTIPLIER: u32 = 0x61c8_8647;

macro_rules! integer_table_key {
    ($($t:ty),*) => {$(
        impl TableKey for $t {
            fn hash(&self) -> u32 {
                (*self as u32).wrapping_mul(INTEGER_HASH_MULTIPLIER)
            }

            fn matches(&self, other: &Self) -> bool {
                self == other
            }
        }
    )*};
}

integer_table_key!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// FNV-1a over a byte string.
pub(crate) fn fnv1a_bytes(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

impl TableKey for &'static str {
    fn hash(&self) -> u32 {
        fnv1a_bytes(self.as_bytes())
    }

    /// Pointer equality first; string literals are usually deduplicated so
    /// the full comparison rarely runs.
    fn matches(&self, other: &Self) -> bool {
        std::ptr::eq(self.as_ptr(), other.as_ptr()) || self == other
    }
}

impl TableKey for String {
    fn hash(&self) -> u32 {
        fnv1a_bytes(self.as_bytes())
    }

    fn matches(&self, other: &Self) -> bool {
        self == other
    }
}

/// Node contract. The table threads its bucket lists through the slot
/// returned by `next_slot`; `hash` must be the cached hash of `key`.
pub trait Node {
    type Key: TableKey;

    /// Construct from a key (used by `insert_unique`).
    fn new(key: Self::Key) -> Self
    where
        Self: Sized;

    fn key(&self) -> &Self::Key;
    fn hash(&self) -> u32;
    fn next(&self) -> *mut Self;
    /// The embedded next-pointer field itself, so removal can rewrite
    /// whichever link reached this node without special-casing the bucket
    /// head.
    fn next_slot(&mut self) -> &mut *mut Self;
}

/// Disposal policy invoked for nodes leaving the table.
pub trait Deleter<N> {
    /// Dispose of `node`.
    ///
    /// # Safety
    ///
    /// `node` has been unlinked and the table holds no other reference to
    /// it.
    unsafe fn delete(&self, node: NonNull<N>);
}

/// Drops the node and returns its memory to the memory manager. The right
/// policy for nodes created by `insert_unique`.
#[derive(Default, Clone, Copy)]
pub struct OwnedDelete;

impl<N> Deleter<N> for OwnedDelete {
    unsafe fn delete(&self, node: NonNull<N>) {
        // SAFETY: per the trait contract the node is unlinked; it was
        // placement-constructed in manager memory by insert_unique.
        unsafe {
            std::ptr::drop_in_place(node.as_ptr());
            manager::free(node.as_ptr().cast());
        }
    }
}

/// Unlinks without disposing. For tables over nodes owned elsewhere.
#[derive(Default, Clone, Copy)]
pub struct DoNotDelete;

impl<N> Deleter<N> for DoNotDelete {
    unsafe fn delete(&self, _node: NonNull<N>) {}
}

/// Adapts a closure into a [`Deleter`], e.g. a free-list recycler.
pub struct FnDeleter<F>(pub F);

impl<N, F: Fn(NonNull<N>)> Deleter<N> for FnDeleter<F> {
    unsafe fn delete(&self, node: NonNull<N>) {
        (self.0)(node);
    }
}

/// Bucket storage policy: a power-of-two array of list heads.
pub trait Buckets<N> {
    /// Head array, null heads for empty buckets. Null when unallocated.
    fn data(&self) -> *const *mut N;
    fn data_mut(&mut self) -> *mut *mut N;
    /// Bucket count; zero when unallocated.
    fn capacity(&self) -> usize;
    fn table_size_bits(&self) -> u32;
}

/// Inline bucket array. `CAPACITY` must be a power of two.
pub struct InlineBuckets<N, const CAPACITY: usize> {
    heads: [*mut N; CAPACITY],
}

impl<N, const CAPACITY: usize> InlineBuckets<N, CAPACITY> {
    const VALID: () = assert!(
        CAPACITY.is_power_of_two(),
        "bucket count must be a power of two"
    );

    pub fn new() -> Self {
        let () = Self::VALID;
        Self {
            heads: [std::ptr::null_mut(); CAPACITY],
        }
    }
}

impl<N, const CAPACITY: usize> Default for InlineBuckets<N, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, const CAPACITY: usize> Buckets<N> for InlineBuckets<N, CAPACITY> {
    fn data(&self) -> *const *mut N {
        self.heads.as_ptr()
    }

    fn data_mut(&mut self) -> *mut *mut N {
        self.heads.as_mut_ptr()
    }

    fn capacity(&self) -> usize {
        CAPACITY
    }

    fn table_size_bits(&self) -> u32 {
        CAPACITY.trailing_zeros()
    }
}

/// Dynamically allocated bucket array; the size is chosen once by
/// [`HashTable::set_table_size_bits`].
pub struct DynamicBuckets<N> {
    heads: *mut *mut N,
    bits: u32,
}

unsafe impl<N: Send> Send for DynamicBuckets<N> {}

impl<N> DynamicBuckets<N> {
    pub const fn new() -> Self {
        Self {
            heads: std::ptr::null_mut(),
            bits: 0,
        }
    }

    fn set_table_size_bits(&mut self, bits: u32) {
        crate::kl_verify!(
            self.heads.is_null(),
            "table size already set to {} bits",
            self.bits
        );
        crate::kl_verify!(bits > 0 && bits < HASH_BITS, "table bits out of range: {bits}");
        let capacity = 1usize << bits;
        let bytes = capacity * std::mem::size_of::<*mut N>();
        let heads = manager::allocate(bytes, AllocatorId::Current, std::mem::align_of::<*mut N>())
            .cast::<*mut N>()
            .as_ptr();
        // SAFETY: freshly allocated array of `capacity` head slots.
        unsafe { std::ptr::write_bytes(heads, 0, capacity) };
        self.heads = heads;
        self.bits = bits;
    }
}

impl<N> Default for DynamicBuckets<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> Drop for DynamicBuckets<N> {
    fn drop(&mut self) {
        if !self.heads.is_null() {
            // SAFETY: the head array came from set_table_size_bits.
            unsafe { manager::free(self.heads.cast()) };
        }
    }
}

impl<N> Buckets<N> for DynamicBuckets<N> {
    fn data(&self) -> *const *mut N {
        self.heads
    }

    fn data_mut(&mut self) -> *mut *mut N {
        self.heads
    }

    fn capacity(&self) -> usize {
        if self.heads.is_null() {
            0
        } else {
            1 << self.bits
        }
    }

    fn table_size_bits(&self) -> u32 {
        self.bits
    }
}

fn bucket_index(hash: u32, bits: u32) -> usize {
    if bits == 0 {
        0
    } else {
        (hash >> (HASH_BITS - bits)) as usize
    }
}

/// The hash table. See the module docs.
pub struct HashTable<
    N: Node,
    B: Buckets<N> = DynamicBuckets<N>,
    D: Deleter<N> + Default = OwnedDelete,
> {
    size: usize,
    buckets: B,
    _marker: PhantomData<(*mut N, D)>,
}

// A table owns (or borrows, per the deleter policy) its nodes; it moves
// between threads when the nodes and bucket storage can.
unsafe impl<N: Node + Send, B: Buckets<N> + Send, D: Deleter<N> + Default> Send
    for HashTable<N, B, D>
{
}

impl<N: Node, B: Buckets<N> + Default, D: Deleter<N> + Default> HashTable<N, B, D> {
    pub fn new() -> Self {
        Self {
            size: 0,
            buckets: B::default(),
            _marker: PhantomData,
        }
    }
}

impl<N: Node, B: Buckets<N> + Default, D: Deleter<N> + Default> Default for HashTable<N, B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Node, D: Deleter<N> + Default> HashTable<N, DynamicBuckets<N>, D> {
    /// Choose the bucket count (`2^bits`) and make the one allocation.
    /// One-shot; a second call is fatal.
    pub fn set_table_size_bits(&mut self, bits: u32) {
        self.buckets.set_table_size_bits(bits);
    }
}

impl<N: Node, B: Buckets<N>, D: Deleter<N> + Default> HashTable<N, B, D> {
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.capacity()
    }

    /// Mean nodes per bucket.
    pub fn load_factor(&self) -> f32 {
        let buckets = self.buckets.capacity();
        if buckets == 0 {
            0.0
        } else {
            self.size as f32 / buckets as f32
        }
    }

    /// Size of the fullest bucket.
    pub fn load_max(&self) -> usize {
        let mut maximum = 0;
        for i in 0..self.buckets.capacity() {
            // SAFETY: i < capacity; bucket lists link initialized nodes.
            let mut node = unsafe { *self.buckets.data().add(i) };
            let mut count = 0;
            while !node.is_null() {
                count += 1;
                node = unsafe { (*node).next() };
            }
            maximum = maximum.max(count);
        }
        maximum
    }

    fn bucket_for(&self, hash: u32) -> *const *mut N {
        let index = bucket_index(hash, self.buckets.table_size_bits());
        debug_assert!(index < self.buckets.capacity());
        // SAFETY: index < capacity; callers check capacity > 0.
        unsafe { self.buckets.data().add(index) }
    }

    fn bucket_for_mut(&mut self, hash: u32) -> *mut *mut N {
        let index = bucket_index(hash, self.buckets.table_size_bits());
        debug_assert!(index < self.buckets.capacity());
        // SAFETY: index < capacity; callers check capacity > 0.
        unsafe { self.buckets.data_mut().add(index) }
    }

    /// Return the node holding `key`, or construct one from the current
    /// allocator and link it. Allocation failure is fatal, so this always
    /// returns a node.
    pub fn insert_unique(&mut self, key: N::Key) -> &mut N {
        crate::kl_verify!(self.buckets.capacity() != 0, "table size not set");
        let bucket = self.bucket_for_mut(key.hash());
        // SAFETY: bucket lists link initialized nodes; the new node is
        // placement-constructed before it becomes reachable.
        unsafe {
            let mut node = *bucket;
            while !node.is_null() {
                if (*node).key().matches(&key) {
                    return &mut *node;
                }
                node = (*node).next();
            }

            let node = manager::allocate(
                std::mem::size_of::<N>(),
                AllocatorId::Current,
                std::mem::align_of::<N>(),
            )
            .cast::<N>()
            .as_ptr();
            node.write(N::new(key));
            *(*node).next_slot() = *bucket;
            *bucket = node;
            self.size += 1;
            &mut *node
        }
    }

    /// Link a pre-constructed node. Duplicate keys are allowed; inserting a
    /// node that is already linked in this table is a fatal error.
    ///
    /// # Safety
    ///
    /// `node` must stay valid for as long as it is linked, and its disposal
    /// must be compatible with the table's deleter policy `D`.
    pub unsafe fn insert_node(&mut self, node: NonNull<N>) {
        crate::kl_verify!(self.buckets.capacity() != 0, "table size not set");
        let hash = unsafe { node.as_ref().hash() };
        let bucket = self.bucket_for_mut(hash);
        // SAFETY: the caller hands over a valid node.
        unsafe {
            if cfg!(any(debug_assertions, feature = "diagnostics")) {
                let mut scan = *bucket;
                while !scan.is_null() {
                    crate::kl_check!(scan != node.as_ptr(), "node inserted twice");
                    scan = (*scan).next();
                }
            }
            *(*node.as_ptr()).next_slot() = *bucket;
            *bucket = node.as_ptr();
        }
        self.size += 1;
    }

    /// First node matching `key`, or the next duplicate after `previous`.
    /// `previous` must be a node returned for the same key that has not
    /// been removed since.
    pub fn find(&self, key: &N::Key, previous: Option<&N>) -> Option<&N> {
        if self.buckets.capacity() == 0 {
            return None;
        }
        let mut node = match previous {
            // SAFETY: bucket_for is in range.
            None => unsafe { *self.bucket_for(key.hash()) },
            Some(previous) => {
                crate::kl_check!(previous.key().matches(key), "previous mismatch");
                previous.next()
            }
        };
        // SAFETY: bucket lists link initialized nodes.
        unsafe {
            while !node.is_null() {
                if (*node).key().matches(key) {
                    return Some(&*node);
                }
                node = (*node).next();
            }
        }
        None
    }

    /// Number of nodes matching `key`.
    pub fn count(&self, key: &N::Key) -> usize {
        let mut total = 0;
        let mut found = self.find(key, None);
        while let Some(node) = found {
            total += 1;
            found = self.find(key, Some(node));
        }
        total
    }

    /// Unlink and return the first node matching `key`. The caller takes
    /// responsibility for the node's disposal.
    pub fn extract(&mut self, key: &N::Key) -> Option<NonNull<N>> {
        if self.buckets.capacity() == 0 {
            return None;
        }
        let mut current = self.bucket_for_mut(key.hash());
        // SAFETY: `current` walks link slots starting at the bucket head;
        // every slot holds either null or a live node.
        unsafe {
            loop {
                let node = *current;
                if node.is_null() {
                    return None;
                }
                if (*node).key().matches(key) {
                    *current = (*node).next();
                    self.size -= 1;
                    return Some(NonNull::new_unchecked(node));
                }
                current = (*node).next_slot();
            }
        }
    }

    /// Unlink every node matching `key`, applying `deleter` to each.
    /// Returns how many were removed.
    pub fn erase_with<DO: Deleter<N>>(&mut self, key: &N::Key, deleter: &DO) -> usize {
        if self.buckets.capacity() == 0 {
            return 0;
        }
        let mut removed = 0;
        let mut current = self.bucket_for_mut(key.hash());
        // SAFETY: same walk as extract; nodes are unlinked before disposal.
        unsafe {
            loop {
                let node = *current;
                if node.is_null() {
                    break;
                }
                if (*node).key().matches(key) {
                    *current = (*node).next();
                    deleter.delete(NonNull::new_unchecked(node));
                    removed += 1;
                } else {
                    current = (*node).next_slot();
                }
            }
        }
        self.size -= removed;
        removed
    }

    /// Unlink every node matching `key` with the default policy.
    pub fn erase(&mut self, key: &N::Key) -> usize {
        self.erase_with(key, &D::default())
    }

    /// Unlink every node matching `key` without disposing of any.
    pub fn release_key(&mut self, key: &N::Key) -> usize {
        self.erase_with(key, &DoNotDelete)
    }

    /// Remove every node, applying `deleter` to each.
    pub fn clear_with<DO: Deleter<N>>(&mut self, deleter: &DO) {
        if self.size == 0 {
            return;
        }
        for i in 0..self.buckets.capacity() {
            // SAFETY: i < capacity; each chain is unlinked before disposal.
            unsafe {
                let slot = self.buckets.data_mut().add(i);
                let mut node = *slot;
                *slot = std::ptr::null_mut();
                while !node.is_null() {
                    let next = (*node).next();
                    deleter.delete(NonNull::new_unchecked(node));
                    node = next;
                }
            }
        }
        self.size = 0;
    }

    /// Remove every node with the default policy.
    pub fn clear(&mut self) {
        self.clear_with(&D::default());
    }

    /// Forget every node without disposing of any.
    pub fn release_all(&mut self) {
        self.clear_with(&DoNotDelete);
    }

    /// Iterate every node. Order is bucket order, stable across unrelated
    /// modifications.
    pub fn iter(&self) -> Iter<'_, N, B, D> {
        Iter {
            table: self,
            next_bucket: 0,
            node: std::ptr::null_mut(),
        }
    }
}

impl<N: Node, B: Buckets<N>, D: Deleter<N> + Default> Drop for HashTable<N, B, D> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Forward iterator over every node.
pub struct Iter<'a, N: Node, B: Buckets<N>, D: Deleter<N> + Default> {
    table: &'a HashTable<N, B, D>,
    next_bucket: usize,
    node: *mut N,
}

impl<'a, N: Node, B: Buckets<N>, D: Deleter<N> + Default> Iterator for Iter<'a, N, B, D> {
    type Item = &'a N;

    fn next(&mut self) -> Option<&'a N> {
        // SAFETY: bucket indices are bounds-checked; lists link live nodes
        // for the lifetime of the shared borrow.
        unsafe {
            while self.node.is_null() {
                if self.next_bucket >= self.table.buckets.capacity() {
                    return None;
                }
                self.node = *self.table.buckets.data().add(self.next_bucket);
                self.next_bucket += 1;
            }
            let node = self.node;
            self.node = (*node).next();
            Some(&*node)
        }
    }
}
