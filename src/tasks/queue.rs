//! Priority-heap task queue.
//!
//! Tasks carry an integer priority; higher runs first, and equal
//! priorities dispatch in enqueue order via a monotonic sequence number in
//! the heap record. With a worker pool (`threads` feature, non-zero pool
//! size) workers sleep on a condition variable and `wait_for_all`
//! contributes the calling thread; with a pool size of zero the queue is
//! cooperative and `wait_for_all` drains everything on the caller.
//!
//! A task's `execute` is the last access to the task object: it receives
//! ownership and may re-enqueue itself (or a successor) through the handle
//! it is given.

use std::sync::{Arc, Condvar, Mutex};

use crate::containers::DynArray;

/// A unit of work. `execute` consumes the task; the queue never touches it
/// again afterwards.
pub trait Task: Send {
    fn execute(self: Box<Self>, queue: &TaskQueueHandle);

    /// Shown in trace logs while the task runs.
    fn label(&self) -> &'static str {
        "task"
    }
}

struct TaskRecord {
    task: Box<dyn Task>,
    priority: i32,
    seq: u64,
}

// Max-heap order: higher priority first, then lower sequence number so
// equal priorities dispatch first-in-first-out.
fn record_less(a: &TaskRecord, b: &TaskRecord) -> bool {
    a.priority < b.priority || (a.priority == b.priority && a.seq > b.seq)
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum RunLevel {
    Running,
    Stopped,
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum LoopMode {
    /// A pool worker: waits for new tasks until shutdown.
    Pool,
    /// A caller in `wait_for_all`: helps out, then waits for completion.
    Waiting,
    /// The destructor: as `Waiting`, then stops the queue.
    Stopping,
}

struct QueueState {
    tasks: DynArray<TaskRecord>,
    run_level: RunLevel,
    executing: usize,
    next_seq: u64,
}

struct Inner {
    state: Mutex<QueueState>,
    new_tasks: Condvar,
    completion: Condvar,
}

/// A cheap handle for enqueueing, the view tasks get of their queue.
#[derive(Clone)]
pub struct TaskQueueHandle {
    inner: Arc<Inner>,
}

impl TaskQueueHandle {
    /// Add a task. Enqueueing on a stopped queue is fatal; overflowing the
    /// queue's fixed capacity is fatal.
    pub fn enqueue(&self, task: Box<dyn Task>, priority: i32) {
        let mut state = self.inner.state.lock().expect("task queue poisoned");
        crate::kl_verify!(
            state.run_level == RunLevel::Running,
            "enqueue on stopped queue"
        );
        let seq = state.next_seq;
        state.next_seq += 1;
        state.tasks.push_heap_by(
            TaskRecord {
                task,
                priority,
                seq,
            },
            record_less,
        );
        drop(state);
        self.inner.new_tasks.notify_one();
    }
}

/// The queue itself. Dropping it drains outstanding work, stops the pool
/// and joins the workers.
pub struct TaskQueue {
    handle: TaskQueueHandle,
    #[cfg(feature = "threads")]
    workers: Vec<std::thread::JoinHandle<()>>,
    pool_size: usize,
}

impl TaskQueue {
    /// A queue holding at most `queue_capacity` pending tasks, executed by
    /// `pool_size` workers. Zero workers selects cooperative
    /// single-threaded mode (always the case without the `threads`
    /// feature).
    pub fn new(queue_capacity: usize, pool_size: usize) -> Self {
        let mut tasks = DynArray::new();
        tasks.reserve(queue_capacity);

        let inner = Arc::new(Inner {
            state: Mutex::new(QueueState {
                tasks,
                run_level: RunLevel::Running,
                executing: 0,
                next_seq: 0,
            }),
            new_tasks: Condvar::new(),
            completion: Condvar::new(),
        });
        let handle = TaskQueueHandle { inner };
        Self::spawn_pool(handle, pool_size)
    }

    #[cfg(feature = "threads")]
    fn spawn_pool(handle: TaskQueueHandle, pool_size: usize) -> Self {
        let workers = (0..pool_size)
            .map(|_| {
                let inner = handle.inner.clone();
                std::thread::spawn(move || task_loop(&inner, LoopMode::Pool))
            })
            .collect();
        Self {
            handle,
            workers,
            pool_size,
        }
    }

    #[cfg(not(feature = "threads"))]
    fn spawn_pool(handle: TaskQueueHandle, _pool_size: usize) -> Self {
        Self {
            handle,
            pool_size: 0,
        }
    }

    /// The enqueue-only view, cloneable and shareable with tasks.
    pub fn handle(&self) -> TaskQueueHandle {
        self.handle.clone()
    }

    /// See [`TaskQueueHandle::enqueue`].
    pub fn enqueue(&self, task: Box<dyn Task>, priority: i32) {
        self.handle.enqueue(task, priority);
    }

    /// Run until the queue is empty and every dispatched task has
    /// finished. In pool mode the calling thread contributes; in
    /// cooperative mode it does all the work.
    pub fn wait_for_all(&self) {
        if self.pool_size > 0 {
            task_loop(&self.handle.inner, LoopMode::Waiting);
        } else {
            drain_single_threaded(&self.handle);
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        if self.pool_size > 0 {
            task_loop(&self.handle.inner, LoopMode::Stopping);
            #[cfg(feature = "threads")]
            for worker in self.workers.drain(..) {
                let _ = worker.join();
            }
        } else {
            drain_single_threaded(&self.handle);
        }
    }
}

fn pop_best(state: &mut QueueState) -> Option<TaskRecord> {
    state.tasks.pop_heap_by(record_less)
}

fn drain_single_threaded(handle: &TaskQueueHandle) {
    loop {
        let record = {
            let mut state = handle.inner.state.lock().expect("task queue poisoned");
            pop_best(&mut state)
        };
        match record {
            Some(record) => {
                crate::kl_trace!("task {}", record.task.label());
                record.task.execute(handle);
            }
            None => return,
        }
    }
}

/// The shared task loop. Workers run it in `Pool` mode for the queue's
/// lifetime; `wait_for_all` and the destructor run it in `Waiting` and
/// `Stopping` mode on the calling thread.
fn task_loop(inner: &Arc<Inner>, mode: LoopMode) {
    let handle = TaskQueueHandle {
        inner: inner.clone(),
    };
    let mut finished_one = false;
    loop {
        let record;
        {
            let mut state = inner.state.lock().expect("task queue poisoned");

            if finished_one {
                // Reacquired after running a task; report its completion.
                finished_one = false;
                crate::kl_check!(state.executing > 0, "task accounting underflow");
                state.executing -= 1;
                if state.executing == 0 && state.tasks.is_empty() {
                    inner.completion.notify_all();
                }
            }

            if mode == LoopMode::Pool {
                while state.tasks.is_empty() && state.run_level == RunLevel::Running {
                    state = inner.new_tasks.wait(state).expect("task queue poisoned");
                }
            }

            if state.tasks.is_empty() {
                if mode != LoopMode::Pool {
                    // Every task is dispatched; wait for the stragglers.
                    // Tasks may still enqueue subtasks before completion.
                    while !(state.tasks.is_empty() && state.executing == 0) {
                        state = inner.completion.wait(state).expect("task queue poisoned");
                    }
                    if mode == LoopMode::Stopping {
                        state.run_level = RunLevel::Stopped;
                        inner.new_tasks.notify_all();
                        inner.completion.notify_all();
                    }
                }
                return;
            }

            record = pop_best(&mut state).expect("tasks non-empty");
            state.executing += 1;
        }

        // Outside the lock. This is the last access to the task object;
        // it may delete itself or re-enqueue itself, completion is not
        // reported until it returns.
        crate::kl_trace!("task {}", record.task.label());
        record.task.execute(&handle);
        finished_one = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OrderProbe {
        tag: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl Task for OrderProbe {
        fn execute(self: Box<Self>, _queue: &TaskQueueHandle) {
            self.log.lock().unwrap().push(self.tag);
        }

        fn label(&self) -> &'static str {
            "order-probe"
        }
    }

    #[test]
    fn test_single_threaded_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = TaskQueue::new(8, 0);
        for (tag, priority) in [(1, 1), (3, 3), (2, 2)] {
            queue.enqueue(
                Box::new(OrderProbe {
                    tag,
                    log: log.clone(),
                }),
                priority,
            );
        }
        queue.wait_for_all();
        assert_eq!(*log.lock().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn test_equal_priorities_dispatch_fifo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = TaskQueue::new(16, 0);
        for tag in 0..10 {
            queue.enqueue(
                Box::new(OrderProbe {
                    tag,
                    log: log.clone(),
                }),
                5,
            );
        }
        queue.wait_for_all();
        assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    struct Countdown {
        remaining: usize,
        counter: Arc<AtomicUsize>,
    }

    impl Task for Countdown {
        fn execute(self: Box<Self>, queue: &TaskQueueHandle) {
            self.counter.fetch_add(1, Ordering::Relaxed);
            if self.remaining > 0 {
                // Tasks may re-enqueue themselves.
                queue.enqueue(
                    Box::new(Countdown {
                        remaining: self.remaining - 1,
                        counter: self.counter.clone(),
                    }),
                    0,
                );
            }
        }
    }

    #[test]
    fn test_task_reenqueues_itself() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::new(4, 0);
        queue.enqueue(
            Box::new(Countdown {
                remaining: 4,
                counter: counter.clone(),
            }),
            0,
        );
        queue.wait_for_all();
        assert_eq!(counter.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_drop_drains_pending_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let queue = TaskQueue::new(4, 0);
            queue.enqueue(
                Box::new(Countdown {
                    remaining: 0,
                    counter: counter.clone(),
                }),
                0,
            );
        }
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[cfg(feature = "threads")]
    #[test]
    fn test_pool_executes_every_task_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::new(64, 3);
        for i in 0..32 {
            queue.enqueue(
                Box::new(Countdown {
                    remaining: 0,
                    counter: counter.clone(),
                }),
                i % 4,
            );
        }
        queue.wait_for_all();
        assert_eq!(counter.load(Ordering::Relaxed), 32);
    }

    #[cfg(feature = "threads")]
    #[test]
    fn test_pool_wait_for_all_includes_subtasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::new(16, 2);
        queue.enqueue(
            Box::new(Countdown {
                remaining: 7,
                counter: counter.clone(),
            }),
            1,
        );
        queue.wait_for_all();
        assert_eq!(counter.load(Ordering::Relaxed), 8);
    }
}
