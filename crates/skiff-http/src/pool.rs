//! Fixed-size worker pool consuming accepted sockets.
//!
//! The accept loop pushes sockets onto a FIFO queue guarded by a mutex; a
//! condition variable wakes one worker per enqueue. Workers pop under the
//! lock and run the connection handler outside it. A panicking handler is
//! caught and discarded — it must never take the worker down with it.

use parking_lot::{Condvar, Mutex};
use skiff_core::log_error;
use std::collections::VecDeque;
use std::net::TcpStream;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 8;

/// The per-connection entry point run by workers.
pub type ConnectionFn = Arc<dyn Fn(TcpStream) + Send + Sync>;

struct PoolShared {
    queue: Mutex<VecDeque<TcpStream>>,
    ready: Condvar,
    shutdown: AtomicBool,
}

/// A fixed set of worker threads behind a shared queue.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one) running `handler` for each
    /// dequeued socket.
    #[must_use]
    pub fn new(size: usize, handler: ConnectionFn) -> Self {
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let workers = (0..size.max(1))
            .map(|index| {
                let shared = Arc::clone(&shared);
                let handler = Arc::clone(&handler);
                std::thread::Builder::new()
                    .name(format!("skiff-worker-{index}"))
                    .spawn(move || worker_loop(&shared, &handler))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self { shared, workers }
    }

    /// Enqueue an accepted socket and wake one waiting worker.
    pub fn execute(&self, stream: TcpStream) {
        let mut queue = self.shared.queue.lock();
        queue.push_back(stream);
        self.shared.ready.notify_one();
    }

    /// Number of sockets waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Stop accepting work and join the workers. Sockets already queued are
    /// drained first.
    pub fn shutdown(mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.ready.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &PoolShared, handler: &ConnectionFn) {
    loop {
        let stream = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(stream) = queue.pop_front() {
                    break stream;
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                shared.ready.wait(&mut queue);
            }
        };

        // The lock is released here; the handler may block for the whole
        // life of the connection.
        if catch_unwind(AssertUnwindSafe(|| handler(stream))).is_err() {
            log_error!("connection handler panicked; worker continues");
        }
    }
}
