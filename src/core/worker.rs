//! Single-flight background worker
//!
//! One persistent thread receives jobs over a channel. For each candidate it
//! waits for pending dependents to settle, clips the candidate against
//! existing coverage, inserts the remainder and merges adjacent rectangles
//! until nothing else merges. Stored rectangles that the tick placed since
//! the last pass are clipped against visible coverage first. At most one pass
//! runs at any time.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use butterfly_common::{Error, Result};
use crossbeam_channel::{unbounded, Sender};
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::core::config::FogConfig;
use crate::core::geometry::{self, Bounds};
use crate::core::grid::GridLookup;
use crate::core::queue::IngestQueue;
use crate::core::rect::{GridId, RectState, Rectangle, SegmentId};
use crate::core::resolver::Resolver;
use crate::core::store::{RectId, RectangleStore};

/// State shared between the tick side and the worker thread
pub(crate) struct Shared {
    pub store: RectangleStore,
    pub queue: IngestQueue,
    pub grids: Arc<dyn GridLookup>,
    pub config: FogConfig,
    busy: AtomicBool,
    shutdown: AtomicBool,
    /// Stored rectangles placed by a tick and not yet clipped
    settled: Mutex<BTreeSet<RectId>>,
    signal: Mutex<()>,
    resolved: Condvar,
}

impl Shared {
    pub fn new(store: RectangleStore, grids: Arc<dyn GridLookup>, config: FogConfig) -> Self {
        Self {
            store,
            queue: IngestQueue::new(),
            grids,
            config,
            busy: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            settled: Mutex::new(BTreeSet::new()),
            signal: Mutex::new(()),
            resolved: Condvar::new(),
        }
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.grids.as_ref(), self.config.cell_size)
    }

    /// Wake a pass waiting on pending dependents
    pub fn notify_resolved(&self) {
        let _guard = self.signal.lock();
        self.resolved.notify_all();
    }

    /// Record stored rectangles that just got placed
    pub fn note_settled(&self, ids: impl IntoIterator<Item = RectId>) {
        self.settled.lock().extend(ids);
    }

    pub fn has_settled(&self) -> bool {
        !self.settled.lock().is_empty()
    }

    pub fn forget_settled(&self) {
        self.settled.lock().clear();
    }

    /// True while a pending stored rectangle shares a corner grid with the
    /// candidate
    pub fn is_blocked(&self, candidate: &Rectangle) -> bool {
        candidate
            .anchor()
            .is_some_and(|a| self.store.has_pending_dependents(&[a.ul_grid, a.br_grid]))
    }

    /// Oldest resolved candidate that is not waiting on a dependent
    pub fn next_candidate(&self) -> Option<Rectangle> {
        self.queue.pop_ready(|r| self.is_blocked(r))
    }

    /// Something a pass could do right now
    pub fn has_work(&self) -> bool {
        self.has_settled() || self.queue.has_ready(|r| self.is_blocked(r))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the single pass slot
    pub fn try_claim(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.notify_resolved();
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Unit of work handed to the thread once the pass slot is claimed
#[derive(Debug)]
pub(crate) enum Job {
    Candidate(Rectangle),
    /// Only clip and merge what the tick placed
    Reconcile,
}

/// How a pass ended
#[derive(Debug)]
enum PassOutcome {
    Done { inserted: usize, merges: usize },
    /// Wait interrupted; the candidate goes back to the queue
    Aborted(Rectangle),
}

/// Handle to the worker thread
pub(crate) struct Worker {
    /// Dropped on shutdown, which ends the thread's receive loop
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(shared: Arc<Shared>) -> Result<Self> {
        let (tx, rx) = unbounded::<Job>();
        let name = shared.config.worker_name.clone();

        let handle = std::thread::Builder::new().name(name.clone()).spawn(move || {
            info!("Worker {name} started");
            while let Ok(job) = rx.recv() {
                drain_from(&shared, job);
            }
            debug!("Worker {name} stopped");
        })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Hand a job to the thread; gives it back if the thread is gone
    pub fn dispatch(&self, job: Job) -> std::result::Result<(), Job> {
        match &self.tx {
            Some(tx) => tx.send(job).map_err(|e| e.0),
            None => Err(job),
        }
    }

    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Fog worker panicked during shutdown");
            }
        }
    }

    pub fn ensure_running(&self) -> Result<()> {
        match &self.handle {
            Some(handle) if !handle.is_finished() => Ok(()),
            _ => Err(Error::WorkerUnavailable("fog worker is not running".to_string())),
        }
    }
}

/// Run passes back to back while there is work, then give up the pass slot.
fn drain_from(shared: &Shared, job: Job) {
    let mut next = match job {
        Job::Candidate(candidate) => Some(candidate),
        Job::Reconcile => None,
    };
    loop {
        reconcile_settled(shared);

        let candidate = match next.take() {
            Some(candidate) => candidate,
            None if shared.is_shutting_down() => break,
            None => match shared.next_candidate() {
                Some(candidate) => candidate,
                None => break,
            },
        };
        match run_pass(shared, candidate) {
            PassOutcome::Done { inserted, merges } => {
                shared.store.mark_changed();
                debug!("Fog pass done: {inserted} piece(s) inserted, {merges} merge(s)");
            }
            PassOutcome::Aborted(candidate) => {
                debug!("Fog pass aborted, candidate requeued");
                shared.queue.requeue_front(candidate);
                break;
            }
        }
    }
    shared.release();
}

fn run_pass(shared: &Shared, candidate: Rectangle) -> PassOutcome {
    let (Some(bounds), Some(anchor)) = (candidate.bounds(), candidate.anchor().copied()) else {
        // Only resolved candidates are dispatched
        return PassOutcome::Aborted(candidate);
    };

    if !wait_for_dependencies(shared, &[anchor.ul_grid, anchor.br_grid]) {
        return PassOutcome::Aborted(candidate);
    }

    let inserted = insert_uncovered(shared, &candidate, bounds);
    let merges = merge_to_fixpoint(shared);
    PassOutcome::Done { inserted, merges }
}

/// Bounded cooperative wait until no pending rectangle depends on `grids`.
///
/// Returns false on timeout or shutdown.
fn wait_for_dependencies(shared: &Shared, grids: &[GridId]) -> bool {
    let deadline = Instant::now() + shared.config.dependency_wait;
    let mut guard = shared.signal.lock();
    loop {
        if shared.is_shutting_down() {
            return false;
        }
        if !shared.store.has_pending_dependents(grids) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            debug!("Gave up waiting for pending rectangles depending on {grids:?}");
            return false;
        }
        let step = shared.config.poll_interval.min(deadline - now);
        shared.resolved.wait_for(&mut guard, step);
    }
}

/// Parts of `bounds` not covered by any other rectangle of `segment`.
///
/// Pieces still waiting for a grid count as covered.
fn uncovered<'a>(
    bounds: Bounds,
    segment: SegmentId,
    others: impl Iterator<Item = &'a Rectangle>,
) -> Vec<Bounds> {
    let mut parts = vec![bounds];
    for rect in others {
        if rect.segment != segment {
            continue;
        }
        let Some(covered) = rect.observed_bounds() else {
            continue;
        };
        parts = parts.iter().flat_map(|p| p.subtract(&covered)).collect();
        if parts.is_empty() {
            break;
        }
    }
    parts
}

/// Rectangles for clipped parts, placed where their grids allow
fn place_parts(shared: &Shared, parts: Vec<Bounds>, segment: SegmentId) -> Vec<Rectangle> {
    let resolver = shared.resolver();
    parts
        .into_iter()
        .map(|p| {
            let mut piece = Rectangle::observed(p, segment);
            resolver.advance(&mut piece);
            piece
        })
        .collect()
}

/// Clip the candidate against existing coverage and store what is left.
///
/// Existing rectangles are never shrunk. If the store changed between the
/// view and the insert, the clip is redone against the new view.
fn insert_uncovered(shared: &Shared, candidate: &Rectangle, bounds: Bounds) -> usize {
    loop {
        let (epoch, existing) = shared.store.view();
        let parts = uncovered(bounds, candidate.segment, existing.iter().map(|(_, r)| r));

        let pieces = if parts == [bounds] {
            vec![candidate.clone()]
        } else {
            place_parts(shared, parts, candidate.segment)
        };

        match shared.store.insert_at(epoch, pieces) {
            Ok(count) => return count,
            Err(_) => debug!("Store changed during clip, retrying"),
        }
    }
}

/// Clip every rectangle the tick placed against the coverage around it, then
/// merge. Returns false when there was nothing to do.
fn reconcile_settled(shared: &Shared) -> bool {
    let ids = std::mem::take(&mut *shared.settled.lock());
    if ids.is_empty() {
        return false;
    }
    let clipped = ids.iter().filter(|id| clip_settled(shared, **id)).count();
    let merges = merge_to_fixpoint(shared);
    shared.store.mark_changed();
    debug!(
        "Reconciled {} placed rectangle(s): {clipped} clipped, {merges} merge(s)",
        ids.len()
    );
    true
}

/// A rectangle that only just got placed gives way to coverage that was
/// already there.
fn clip_settled(shared: &Shared, id: RectId) -> bool {
    loop {
        let (epoch, entries) = shared.store.view();
        let Some((bounds, segment)) = entries
            .iter()
            .find(|(i, _)| *i == id)
            .and_then(|(_, r)| Some((r.bounds()?, r.segment)))
        else {
            return false;
        };

        let others = entries.iter().filter(|(i, _)| *i != id).map(|(_, r)| r);
        let parts = uncovered(bounds, segment, others);
        if parts == [bounds] {
            return false;
        }
        let pieces = place_parts(shared, parts, segment);
        match shared.store.swap_at(epoch, id, pieces) {
            Ok(_) => return true,
            Err(_) => debug!("Store changed during clip, retrying"),
        }
    }
}

/// Merge the first mergeable pair and rescan until no pair merges
fn merge_to_fixpoint(shared: &Shared) -> usize {
    let mut merges = 0;
    while let Some((ids, merged)) = find_merge(shared) {
        if shared.store.replace(&ids, merged) {
            merges += 1;
        }
    }
    merges
}

fn find_merge(shared: &Shared) -> Option<([RectId; 2], Rectangle)> {
    let (_, entries) = shared.store.view();
    // Not clipped yet, so not safe to merge
    let unsettled = shared.settled.lock().clone();
    let candidates: Vec<&(RectId, Rectangle)> = entries
        .iter()
        .filter(|(id, r)| r.is_resolved() && !unsettled.contains(id))
        .collect();

    for (i, (id_a, a)) in candidates.iter().enumerate() {
        for (id_b, b) in &candidates[i + 1..] {
            if a.segment != b.segment {
                continue;
            }
            let Some(mut merged) = geometry::merge(a, b) else {
                continue;
            };
            // Never trade visible coverage for a pending rectangle
            if shared.resolver().advance(&mut merged) == RectState::Resolved {
                return Some(([*id_a, *id_b], merged));
            }
        }
    }
    None
}
