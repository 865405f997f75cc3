//! Bracket lookups on a background thread.
//!
//! Cursor moves and scrolling produce a stream of requests of which only the
//! latest matters. [`AsyncBracketsCollector`] runs them on one named worker
//! thread. Each request type has a generation counter; submitting a request
//! bumps it, which cancels the computation in flight and makes queued older
//! requests no-ops. The last result of each type is cached and handed to a
//! newly attached [`BracketReceiver`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::position::Position;
use crate::provider::PairedBracket;

static THREAD_ID: AtomicUsize = AtomicUsize::new(0);

/// Tells a computation whether a newer request superseded it.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    generation: Arc<AtomicU64>,
    target: u64,
}

impl CancellationToken {
    /// A token that is never cancelled.
    #[must_use]
    pub fn none() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            target: 0,
        }
    }

    pub(crate) fn new(generation: &Arc<AtomicU64>, target: u64) -> Self {
        Self {
            generation: Arc::clone(generation),
            target,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::Acquire) != self.target
    }

    /// `Err(Error::Cancelled)` once a newer request exists.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
    }
}

/// The computations run by the worker.
pub trait BracketComputer: Send + Sync {
    /// The pair with a bracket at byte `index`.
    fn compute_matched_bracket(&self, index: usize, token: &CancellationToken) -> Result<Option<PairedBracket>>;

    /// All closed pairs overlapping `[left, right]`.
    fn compute_bracket_pairs_in_range(
        &self,
        left: Position,
        right: Position,
        token: &CancellationToken,
    ) -> Result<Vec<PairedBracket>>;
}

/// Consumer of worker results. Called on the worker thread, or on the
/// caller's thread when a receiver is attached.
pub trait BracketReceiver: Send + Sync {
    fn update_matched_bracket_pair(&self, pair: Option<PairedBracket>);

    fn update_bracket_pairs_in_range(&self, pairs: &[PairedBracket]);
}

enum Request {
    Matched { index: usize, token: CancellationToken },
    Range {
        left: Position,
        right: Position,
        token: CancellationToken,
    },
}

struct Shared {
    computer: Arc<dyn BracketComputer>,
    receiver: RwLock<Option<Arc<dyn BracketReceiver>>>,
    last_matched: Mutex<Option<PairedBracket>>,
    last_pairs: Mutex<Vec<PairedBracket>>,
}

impl Shared {
    fn dispatch_matched(&self, pair: Option<PairedBracket>) {
        *self.last_matched.lock() = pair;
        if let Some(receiver) = self.receiver.read().as_ref() {
            receiver.update_matched_bracket_pair(pair);
        }
    }

    fn dispatch_range(&self, pairs: Vec<PairedBracket>) {
        if let Some(receiver) = self.receiver.read().as_ref() {
            receiver.update_bracket_pairs_in_range(&pairs);
        }
        *self.last_pairs.lock() = pairs;
    }

    fn handle(&self, request: Request) {
        match request {
            Request::Matched { index, token } => {
                if token.is_cancelled() {
                    return;
                }
                match self.computer.compute_matched_bracket(index, &token) {
                    Ok(pair) if !token.is_cancelled() => self.dispatch_matched(pair),
                    Ok(_) | Err(Error::Cancelled) => {}
                    Err(error) => warn!(%error, index, "matched bracket computation failed"),
                }
            }
            Request::Range { left, right, token } => {
                if token.is_cancelled() {
                    return;
                }
                match self.computer.compute_bracket_pairs_in_range(left, right, &token) {
                    Ok(pairs) if !token.is_cancelled() => self.dispatch_range(pairs),
                    Ok(_) | Err(Error::Cancelled) => {}
                    Err(error) => warn!(%error, %left, %right, "bracket pair computation failed"),
                }
            }
        }
    }
}

/// Runs [`BracketComputer`] requests on a dedicated thread.
pub struct AsyncBracketsCollector {
    shared: Arc<Shared>,
    matched_generation: Arc<AtomicU64>,
    range_generation: Arc<AtomicU64>,
    stopped: AtomicBool,
    sender: Mutex<Option<Sender<Request>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncBracketsCollector {
    /// Starts a worker thread named `{name_prefix}-{n}`.
    pub fn new(name_prefix: &str, computer: Arc<dyn BracketComputer>) -> Result<Self> {
        let shared = Arc::new(Shared {
            computer,
            receiver: RwLock::new(None),
            last_matched: Mutex::new(None),
            last_pairs: Mutex::new(Vec::new()),
        });
        let (sender, requests) = crossbeam_channel::unbounded();

        let name = format!("{name_prefix}-{}", THREAD_ID.fetch_add(1, Ordering::Relaxed) + 1);
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(&worker_shared, &requests))?;
        debug!(thread = %name, "started bracket worker");

        Ok(Self {
            shared,
            matched_generation: Arc::new(AtomicU64::new(0)),
            range_generation: Arc::new(AtomicU64::new(0)),
            stopped: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Attaches (or detaches) the result consumer. A new receiver immediately
    /// gets the last results.
    pub fn set_receiver(&self, receiver: Option<Arc<dyn BracketReceiver>>) {
        if let Some(receiver) = &receiver {
            receiver.update_matched_bracket_pair(*self.shared.last_matched.lock());
            receiver.update_bracket_pairs_in_range(&self.shared.last_pairs.lock());
        }
        *self.shared.receiver.write() = receiver;
    }

    /// Looks up the pair at byte `index`, superseding earlier lookups.
    pub fn request_paired_bracket_at(&self, index: usize) -> Result<()> {
        let token = self.next_token(&self.matched_generation)?;
        self.send(Request::Matched { index, token })
    }

    /// Collects the pairs between two positions, superseding earlier requests.
    pub fn request_bracket_pairs_in_range(&self, left: Position, right: Position) -> Result<()> {
        let token = self.next_token(&self.range_generation)?;
        self.send(Request::Range { left, right, token })
    }

    #[must_use]
    pub fn last_matched_pair(&self) -> Option<PairedBracket> {
        *self.shared.last_matched.lock()
    }

    #[must_use]
    pub fn last_bracket_pairs(&self) -> Vec<PairedBracket> {
        self.shared.last_pairs.lock().clone()
    }

    /// Cancels outstanding work and joins the worker. Later requests fail
    /// with [`Error::WorkerStopped`].
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.matched_generation.fetch_add(1, Ordering::AcqRel);
        self.range_generation.fetch_add(1, Ordering::AcqRel);
        // Disconnecting the channel ends the worker loop.
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take()
            && worker.join().is_err()
        {
            warn!("bracket worker panicked");
        }
        *self.shared.receiver.write() = None;
        *self.shared.last_matched.lock() = None;
        self.shared.last_pairs.lock().clear();
    }

    fn next_token(&self, generation: &Arc<AtomicU64>) -> Result<CancellationToken> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(Error::WorkerStopped);
        }
        let target = generation.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(CancellationToken::new(generation, target))
    }

    fn send(&self, request: Request) -> Result<()> {
        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or(Error::WorkerStopped)?;
        sender.send(request).map_err(|_| Error::WorkerStopped)
    }
}

impl Drop for AsyncBracketsCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: &Shared, requests: &Receiver<Request>) {
    for request in requests {
        shared.handle(request);
    }
    debug!("bracket worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn pair(left_index: usize) -> PairedBracket {
        PairedBracket {
            left_index,
            left_length: 1,
            right_index: left_index + 2,
            right_length: 1,
            level: 0,
        }
    }

    /// Answers with a pair at the requested index; index 99 blocks until released.
    struct Scripted {
        release: Receiver<()>,
    }

    impl BracketComputer for Scripted {
        fn compute_matched_bracket(&self, index: usize, token: &CancellationToken) -> Result<Option<PairedBracket>> {
            if index == 99 {
                let _ = self.release.recv();
                token.check()?;
            }
            if index == 7 {
                return Err(Error::WorkerStopped);
            }
            Ok(Some(pair(index)))
        }

        fn compute_bracket_pairs_in_range(
            &self,
            left: Position,
            _right: Position,
            _token: &CancellationToken,
        ) -> Result<Vec<PairedBracket>> {
            Ok(vec![pair(left.column as usize)])
        }
    }

    #[derive(Default)]
    struct Recorder {
        matched: Mutex<Vec<Option<PairedBracket>>>,
        ranges: Mutex<Vec<Vec<PairedBracket>>>,
    }

    impl BracketReceiver for Recorder {
        fn update_matched_bracket_pair(&self, pair: Option<PairedBracket>) {
            self.matched.lock().push(pair);
        }

        fn update_bracket_pairs_in_range(&self, pairs: &[PairedBracket]) {
            self.ranges.lock().push(pairs.to_vec());
        }
    }

    fn collector() -> (AsyncBracketsCollector, Sender<()>) {
        let (release_tx, release) = crossbeam_channel::unbounded();
        let collector = AsyncBracketsCollector::new("brackets-test", Arc::new(Scripted { release })).unwrap();
        (collector, release_tx)
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        for _ in 0..500 {
            if done() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("worker did not produce a result in time");
    }

    #[test]
    fn cancellation_token_follows_generation() {
        let generation = Arc::new(AtomicU64::new(3));
        let token = CancellationToken::new(&generation, 3);
        assert!(token.check().is_ok());
        generation.fetch_add(1, Ordering::AcqRel);
        assert!(matches!(token.check(), Err(Error::Cancelled)));
        assert!(!CancellationToken::none().is_cancelled());
    }

    #[test]
    fn results_reach_the_receiver() {
        let (collector, _release) = collector();
        let recorder = Arc::new(Recorder::default());
        collector.set_receiver(Some(recorder.clone()));

        collector.request_paired_bracket_at(4).unwrap();
        collector
            .request_bracket_pairs_in_range(Position::new(0, 2), Position::new(3, 0))
            .unwrap();
        wait_for(|| collector.last_matched_pair().is_some() && !collector.last_bracket_pairs().is_empty());

        assert_eq!(collector.last_matched_pair(), Some(pair(4)));
        assert_eq!(collector.last_bracket_pairs(), vec![pair(2)]);
        // The replay on attach came first.
        assert_eq!(recorder.matched.lock().first(), Some(&None));
        assert_eq!(recorder.matched.lock().last(), Some(&Some(pair(4))));
    }

    #[test]
    fn newer_request_supersedes_the_running_one() {
        let (collector, release) = collector();
        collector.request_paired_bracket_at(99).unwrap();
        collector.request_paired_bracket_at(5).unwrap();
        release.send(()).unwrap();

        wait_for(|| collector.last_matched_pair().is_some());
        assert_eq!(collector.last_matched_pair(), Some(pair(5)));
    }

    #[test]
    fn late_receiver_gets_cached_results() {
        let (collector, _release) = collector();
        collector.request_paired_bracket_at(1).unwrap();
        wait_for(|| collector.last_matched_pair().is_some());

        let recorder = Arc::new(Recorder::default());
        collector.set_receiver(Some(recorder.clone()));
        assert_eq!(*recorder.matched.lock(), vec![Some(pair(1))]);
        assert_eq!(*recorder.ranges.lock(), vec![Vec::<PairedBracket>::new()]);
    }

    #[test]
    fn failures_keep_the_previous_result() {
        let (collector, _release) = collector();
        collector.request_paired_bracket_at(1).unwrap();
        wait_for(|| collector.last_matched_pair().is_some());
        collector.request_paired_bracket_at(7).unwrap();
        collector.request_paired_bracket_at(2).unwrap();
        wait_for(|| collector.last_matched_pair() == Some(pair(2)));
    }

    #[test]
    fn requests_after_shutdown_fail() {
        let (collector, _release) = collector();
        collector.shutdown();
        assert!(matches!(collector.request_paired_bracket_at(0), Err(Error::WorkerStopped)));
        // A second shutdown is a no-op.
        collector.shutdown();
    }
}
