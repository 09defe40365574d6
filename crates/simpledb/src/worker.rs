//! The background dispatch worker.
//!
//! One named thread drains an unbounded FIFO queue of [`Query`] descriptors
//! and runs each against the shared connection. Results go to the query's
//! success callback, failures to its failure handler or to the registry's
//! default handler. A failing query never stops the worker.

use crate::registry::Registry;
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use simpledb_core::{Connection, Error, Result};
use simpledb_query::{Query, QueryFailure, run_query};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

const THREAD_NAME: &str = "simpledb-dispatch";

/// Handle to the dispatch worker thread.
///
/// Stopping is one-way: after [`Dispatcher::shutdown`] every enqueue fails
/// with [`Error::NotRunning`] and queries still waiting in the queue are
/// dropped without running their callbacks.
pub struct Dispatcher {
    running: Arc<AtomicBool>,
    queue: Sender<Query>,
    stop: Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the worker thread.
    pub fn start(connection: Arc<dyn Connection>, registry: Arc<Registry>) -> Result<Self> {
        let (queue, jobs) = unbounded();
        let (stop, stop_signal) = bounded(1);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || work(&*connection, &registry, &jobs, &stop_signal, &flag))
            .map_err(Error::Io)?;
        tracing::debug!(thread = THREAD_NAME, "dispatch worker started");

        Ok(Self {
            running,
            queue,
            stop,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Whether the worker still accepts queries.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Append `query` to the queue. Never blocks.
    pub fn enqueue(&self, query: Query) -> Result<()> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }
        self.queue.send(query).map_err(|_| Error::NotRunning)
    }

    /// Append every query in order.
    ///
    /// Nothing is enqueued when the worker is already stopped.
    pub fn enqueue_all<I>(&self, queries: I) -> Result<()>
    where
        I: IntoIterator<Item = Query>,
    {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }
        for query in queries {
            self.queue.send(query).map_err(|_| Error::NotRunning)?;
        }
        Ok(())
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// The query currently being processed finishes; nothing after it runs.
    /// When called from the worker thread itself (from a callback) the
    /// thread is not joined and exits once the callback returns.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            // A full stop channel already holds a pending signal.
            let _ = self.stop.try_send(());
            tracing::debug!(thread = THREAD_NAME, "dispatch worker stopping");
        }

        let handle = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::error!(thread = THREAD_NAME, "dispatch worker panicked");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("running", &self.is_running())
            .field("queued", &self.queue.len())
            .finish()
    }
}

fn work(
    connection: &dyn Connection,
    registry: &Registry,
    jobs: &Receiver<Query>,
    stop: &Receiver<()>,
    running: &AtomicBool,
) {
    loop {
        let next = select! {
            recv(stop) -> _ => None,
            recv(jobs) -> job => job.ok(),
        };
        let Some(query) = next else {
            break;
        };
        // Both channels may be ready at once; the flag decides.
        if !running.load(Ordering::Acquire) {
            break;
        }
        dispatch(connection, registry, query);
    }

    let discarded = jobs.len();
    if discarded > 0 {
        tracing::debug!(discarded, "queued queries discarded");
    }
    tracing::debug!(thread = THREAD_NAME, "dispatch worker stopped");
}

fn dispatch(connection: &dyn Connection, registry: &Registry, mut query: Query) {
    match run_query(connection, registry.builders(), &query) {
        Ok(rows) => {
            tracing::trace!(rows = rows.len(), sql = query.sql().unwrap_or_default(), "queued query done");
            if let Some(callback) = query.take_on_success() {
                contain("success callback", || callback(rows));
            }
        }
        Err(error) => {
            let handler = query.take_on_failure();
            let failure = QueryFailure::new(query, error);
            match handler {
                Some(handler) => contain("failure handler", || handler(failure)),
                None => contain("default failure handler", || registry.report_failure(failure)),
            }
        }
    }
}

fn contain(handler: &'static str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(handler, "query handler panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::RecvTimeoutError;
    use simpledb_core::error::{QueryError, QueryErrorKind};
    use simpledb_core::{Row, Value};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    /// Records every SQL text and fails any statement containing "FAIL".
    #[derive(Default)]
    struct Script {
        seen: Mutex<Vec<String>>,
    }

    impl Connection for Script {
        fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            self.seen.lock().unwrap().push(sql.to_string());
            if sql.contains("FAIL") {
                return Err(Error::Query(QueryError {
                    kind: QueryErrorKind::Syntax,
                    sql: Some(sql.to_string()),
                    message: "scripted failure".to_string(),
                    source: None,
                }));
            }
            Ok(vec![Row::new(vec!["sql".into()], vec![Value::Text(sql.to_string())])])
        }

        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64> {
            Ok(0)
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn start() -> (Arc<Script>, Dispatcher) {
        let conn = Arc::new(Script::default());
        let dispatcher = Dispatcher::start(conn.clone(), Arc::new(Registry::with_standard_builders()))
            .unwrap();
        (conn, dispatcher)
    }

    #[test]
    fn callbacks_fire_in_fifo_order() {
        let (_conn, dispatcher) = start();
        let (tx, rx) = crossbeam_channel::unbounded();
        for name in ["A", "B", "C"] {
            let tx = tx.clone();
            dispatcher
                .enqueue(Query::raw(format!("SELECT '{name}'")).on_success(move |_| {
                    tx.send(name).unwrap();
                }))
                .unwrap();
        }
        let order: Vec<_> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(order, ["A", "B", "C"]);
    }

    #[test]
    fn failing_query_does_not_block_the_rest() {
        let (conn, dispatcher) = start();
        let (tx, rx) = crossbeam_channel::unbounded();
        let ok = |tag: &'static str| {
            let tx = tx.clone();
            Query::raw(format!("SELECT {tag}")).on_success(move |_| tx.send(Ok(tag)).unwrap())
        };
        let failing = {
            let tx = tx.clone();
            Query::raw("FAIL").on_failure(move |f| tx.send(Err(f.error.to_string())).unwrap())
        };
        dispatcher.enqueue_all([ok("1"), failing, ok("3")]).unwrap();

        let outcomes: Vec<_> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(outcomes[0], Ok("1"));
        assert!(outcomes[1].as_ref().unwrap_err().contains("scripted failure"));
        assert_eq!(outcomes[2], Ok("3"));
        assert_eq!(conn.seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn unknown_command_goes_to_failure_handler() {
        let (conn, dispatcher) = start();
        let (tx, rx) = crossbeam_channel::unbounded();
        dispatcher
            .enqueue(Query::new("MERGE", "t").on_failure(move |f| tx.send(f).unwrap()))
            .unwrap();
        let failure = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(failure.error, Error::UnknownCommand(ref c) if c == "MERGE"));
        assert!(conn.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn default_handler_receives_unhandled_failures() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut registry = Registry::new();
        registry.set_default_failure_handler(move |f| tx.send(f.to_string()).unwrap());
        let dispatcher = Dispatcher::start(Arc::new(Script::default()), Arc::new(registry)).unwrap();

        dispatcher.enqueue(Query::raw("FAIL now")).unwrap();
        let message = rx.recv_timeout(WAIT).unwrap();
        assert!(message.starts_with("query 'FAIL now' failed"));
    }

    #[test]
    fn panicking_callback_keeps_worker_alive() {
        let (_conn, dispatcher) = start();
        let (tx, rx) = crossbeam_channel::unbounded();
        dispatcher
            .enqueue(Query::raw("SELECT 1").on_success(|_| panic!("callback bug")))
            .unwrap();
        dispatcher
            .enqueue(Query::raw("SELECT 2").on_success(move |_| tx.send(()).unwrap()))
            .unwrap();
        rx.recv_timeout(WAIT).unwrap();
        assert!(dispatcher.is_running());
    }

    #[test]
    fn enqueue_after_shutdown_fails() {
        let (_conn, dispatcher) = start();
        dispatcher.shutdown();
        assert!(!dispatcher.is_running());
        assert!(matches!(dispatcher.enqueue(Query::raw("SELECT 1")), Err(Error::NotRunning)));
        assert!(matches!(
            dispatcher.enqueue_all([Query::raw("SELECT 1")]),
            Err(Error::NotRunning)
        ));
        dispatcher.shutdown();
    }

    #[test]
    fn shutdown_discards_pending_queries() {
        let (_conn, dispatcher) = start();
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let (late_tx, late_rx) = crossbeam_channel::unbounded::<()>();

        dispatcher
            .enqueue(Query::raw("SELECT 1").on_success(move |_| {
                started_tx.send(()).unwrap();
                let _ = gate_rx.recv_timeout(WAIT);
            }))
            .unwrap();
        dispatcher
            .enqueue(Query::raw("SELECT 2").on_success(move |_| late_tx.send(()).unwrap()))
            .unwrap();

        started_rx.recv_timeout(WAIT).unwrap();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(gate_tx);
        });
        dispatcher.shutdown();
        releaser.join().unwrap();

        assert!(matches!(
            late_rx.recv_timeout(Duration::from_millis(100)),
            Err(RecvTimeoutError::Disconnected | RecvTimeoutError::Timeout)
        ));
    }

    #[test]
    fn shutdown_from_worker_thread_does_not_deadlock() {
        let (_conn, dispatcher) = start();
        let dispatcher = Arc::new(dispatcher);
        let (tx, rx) = crossbeam_channel::unbounded();
        let inner = Arc::clone(&dispatcher);
        dispatcher
            .enqueue(Query::raw("SELECT 1").on_success(move |_| {
                inner.shutdown();
                tx.send(inner.is_running()).unwrap();
            }))
            .unwrap();
        assert!(!rx.recv_timeout(WAIT).unwrap());
        assert!(matches!(dispatcher.enqueue(Query::raw("SELECT 2")), Err(Error::NotRunning)));
    }
}
