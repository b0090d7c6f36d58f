//! End-to-end tests across the allocator, container, console and task
//! subsystems.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use keel::console::{exec_line, ConsoleVar, Number};
use keel::containers::{HashTable, InlineBuckets, SetNode};
use keel::diagnostics::{install_sink, CollectingSink, LogLevel};
use keel::tasks::{Task, TaskQueue, TaskQueueHandle};
use keel::{console_command, console_variable, AllocatorId, AllocatorScope, RadixSort};

/// Tests that observe process-global state (allocator counters, the log
/// sink) take this lock.
fn serial() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

// -- console bindings used by the scenarios -------------------------------

static ROUNDTRIP_V: ConsoleVar<i32> = ConsoleVar::new_i32(0);
console_variable!(roundtrip_v: i32 => ROUNDTRIP_V);

static SCRIPT_VAR: ConsoleVar<i32> = ConsoleVar::new_i32(0);
console_variable!(script_var: i32 => SCRIPT_VAR);

static SCRIPT_FN_CALLS: AtomicUsize = AtomicUsize::new(0);
static SCRIPT_FN_LAST: AtomicI64 = AtomicI64::new(0);

fn script_fn(value: Number) -> bool {
    SCRIPT_FN_CALLS.fetch_add(1, Ordering::Relaxed);
    SCRIPT_FN_LAST.store(value.to(), Ordering::Relaxed);
    true
}
console_command!(script_fn(Number));

#[test]
fn console_variable_round_trip() {
    let _serial = serial();
    let sink = Arc::new(CollectingSink::new());
    let previous = install_sink(Some(sink.clone()));

    assert!(exec_line("roundtrip_v 345"));
    assert_eq!(ROUNDTRIP_V.get(), 345);

    // Fractional assignment narrows, with a warning on the log.
    assert!(exec_line("roundtrip_v 3.5"));
    assert_eq!(ROUNDTRIP_V.get(), 3);
    assert!(sink.contains(LogLevel::Warning, "lossy conversion"));

    // A bare name is a query at console level.
    sink.clear();
    assert!(exec_line("roundtrip_v"));
    assert!(sink.contains(LogLevel::Console, "3"));

    install_sink(previous);
}

#[test]
fn console_script_execution() {
    let _serial = serial();
    let path = std::env::temp_dir().join(format!("keel_script_{}.txt", std::process::id()));
    std::fs::write(&path, "script_var 3\n  # comment\n\nscript_var 78\nscript_fn 89\n")
        .expect("write script");

    assert!(keel::exec_file(path.to_str().unwrap()));
    assert_eq!(SCRIPT_VAR.get(), 78);
    assert_eq!(SCRIPT_FN_CALLS.load(Ordering::Relaxed), 1);
    assert_eq!(SCRIPT_FN_LAST.load(Ordering::Relaxed), 89);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn console_exec_builtin_runs_scripts() {
    let _serial = serial();
    let path = std::env::temp_dir().join(format!("keel_exec_{}.txt", std::process::id()));
    std::fs::write(&path, "roundtrip_v 7\n").expect("write script");

    assert!(exec_line(&format!("exec {}", path.display())));
    assert_eq!(ROUNDTRIP_V.get(), 7);

    let _ = std::fs::remove_file(&path);
}

// -- memory scenarios ------------------------------------------------------

#[test]
fn temporary_stack_scope_resets_bytes() {
    let _serial = serial();
    let before = keel::memory::bytes_allocated(AllocatorId::TemporaryStack);
    {
        let _scope = AllocatorScope::new(AllocatorId::TemporaryStack);
        for size in [64usize, 128, 256] {
            let p = keel::memory::allocate_current(size);
            unsafe { keel::memory::free(p.as_ptr()) };
        }
        assert!(keel::memory::bytes_allocated(AllocatorId::TemporaryStack) >= before + 448);
    }
    assert_eq!(
        keel::memory::bytes_allocated(AllocatorId::TemporaryStack),
        before
    );
}

#[test]
fn scratchpad_sections_are_exclusive_and_reusable() {
    let _serial = serial();
    {
        let scope = AllocatorScope::new(AllocatorId::ScratchPage0);
        let p = keel::memory::allocate(512, AllocatorId::Current, 16);
        assert_eq!(p.as_ptr() as usize % 16, 0);
        assert_eq!(scope.current_allocation_count(), 1);
        unsafe { keel::memory::free(p.as_ptr()) };
    }
    // Closed: counters read zero, and the section opens again cleanly.
    assert_eq!(keel::memory::bytes_allocated(AllocatorId::ScratchPage0), 0);
    {
        let _scope = AllocatorScope::new(AllocatorId::ScratchPage0);
        let p = keel::memory::allocate_current(64);
        unsafe { keel::memory::free(p.as_ptr()) };
    }
    assert!(keel::memory::high_water(AllocatorId::ScratchPage0) >= 512);
}

#[test]
fn nested_scopes_restore_current_allocator() {
    let _serial = serial();
    let outer = AllocatorScope::new(AllocatorId::TemporaryStack);
    {
        let inner = AllocatorScope::new(AllocatorId::ScratchTemp);
        assert_eq!(inner.previous_id(), AllocatorId::TemporaryStack);
        let p = keel::memory::allocate_current(32);
        unsafe { keel::memory::free(p.as_ptr()) };
    }
    // Back on the temporary stack.
    let p = keel::memory::allocate_current(32);
    assert!(keel::memory::bytes_allocated(AllocatorId::TemporaryStack) > 0);
    unsafe { keel::memory::free(p.as_ptr()) };
    drop(outer);
}

// -- hash table scenario ---------------------------------------------------

#[test]
fn hash_table_duplicate_keys() {
    type Table = HashTable<SetNode<u32>, InlineBuckets<SetNode<u32>, 256>>;
    let mut table = Table::new();

    // 78 unique keys, then 78 duplicates of the same keys.
    for key in 0..78u32 {
        let node = Box::leak(Box::new(SetNode::new(key)));
        unsafe { table.insert_node(node.into()) };
    }
    for key in 0..78u32 {
        let node = Box::leak(Box::new(SetNode::new(key)));
        unsafe { table.insert_node(node.into()) };
    }
    assert_eq!(table.len(), 156);
    for key in 0..78u32 {
        assert_eq!(table.count(&key), 2);
    }

    // Erase everything, reclaiming the leaked boxes.
    let reclaim = keel::containers::FnDeleter(|node: std::ptr::NonNull<SetNode<u32>>| {
        drop(unsafe { Box::from_raw(node.as_ptr()) });
    });
    for key in 0..78u32 {
        assert_eq!(table.erase_with(&key, &reclaim), 2);
    }
    assert_eq!(table.len(), 0);
    assert!(table.find(&5, None).is_none());
}

// -- radix sort scenario ---------------------------------------------------

#[test]
fn radix_sort_float_keys() {
    let _serial = serial();
    let mut values = ['A', 'B', 'C', 'D', 'E'];
    let keys = [5.0f32, -3.0, 0.0, -0.0, 2.0];

    let mut sorter = RadixSort::<f32, char>::new(keys.len());
    for (key, value) in keys.iter().zip(values.iter_mut()) {
        sorter.insert(*key, value);
    }
    sorter.sort(AllocatorId::TemporaryStack);

    let order: Vec<char> = sorter.iter().copied().collect();
    assert_eq!(order, ['B', 'D', 'C', 'E', 'A']);
}

// -- task queue scenario ---------------------------------------------------

struct Recorder {
    tag: i32,
    log: Arc<Mutex<Vec<i32>>>,
}

impl Task for Recorder {
    fn execute(self: Box<Self>, _queue: &TaskQueueHandle) {
        self.log.lock().unwrap().push(self.tag);
    }

    fn label(&self) -> &'static str {
        "recorder"
    }
}

#[test]
fn task_queue_priority_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let queue = TaskQueue::new(8, 0);
    for priority in [1, 3, 2] {
        queue.enqueue(
            Box::new(Recorder {
                tag: priority,
                log: log.clone(),
            }),
            priority,
        );
    }
    queue.wait_for_all();

    let order = log.lock().unwrap().clone();
    assert_eq!(order.len(), 3);
    let pos = |tag| order.iter().position(|&t| t == tag).unwrap();
    assert!(pos(3) < pos(1));
    assert_eq!(order, vec![3, 2, 1]);
}

#[cfg(feature = "threads")]
#[test]
fn task_queue_pool_runs_each_task_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    {
        let queue = TaskQueue::new(32, 4);
        for tag in 0..16 {
            queue.enqueue(
                Box::new(Recorder {
                    tag,
                    log: log.clone(),
                }),
                tag % 3,
            );
        }
        queue.wait_for_all();
    }
    let mut tags = log.lock().unwrap().clone();
    tags.sort_unstable();
    assert_eq!(tags, (0..16).collect::<Vec<_>>());
}
