//! Bidirectional controller: shared search state, worker spawning, and path
//! reconstruction.
//!
//! Two frontiers run at once, forward from the start cell and backward from
//! the goal cell, each expanded by its own crew of workers. The controller
//! owns everything the crews share: the two node tables, the best-meeting
//! record, the termination flag, and the per-worker arenas. Arenas live in
//! the controller's frame and are only lent to the threads, so parent
//! chains stay valid while the path is walked after the join.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use anyhow::{bail, Result};
use log::{debug, info};
use parking_lot::Mutex;

use crate::grid::MazeFile;

use super::inbox::Inbox;
use super::node::{Node, INF};
use super::table::NodeTable;
use super::worker::{Worker, WorkerState};

/// Search configuration.
///
/// Use `SolverConfig::default()` for one worker per online CPU, or customise
/// via the builder methods.
#[derive(Clone, Debug, Default)]
pub struct SolverConfig {
    /// Total worker threads across both directions.
    /// `None` means the OS-reported parallelism.
    pub thread_count: Option<usize>,
    /// Hard upper bound on threads regardless of detection.
    pub max_threads: Option<usize>,
}

impl SolverConfig {
    /// Set an explicit total thread count.
    pub fn thread_count(mut self, n: usize) -> Self {
        self.thread_count = Some(n.max(1));
        self
    }

    /// Set a hard upper bound on threads.
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = Some(n.max(1));
        self
    }
}

/// Workers per direction: total threads halved, never below one.
fn resolve_crew(config: &SolverConfig) -> usize {
    let mut threads = config.thread_count.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    });
    if let Some(cap) = config.max_threads {
        threads = threads.min(cap);
    }
    (threads / 2).max(1)
}

/// Result of a successful search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathSummary {
    /// Unit steps along the recovered path (edges, not cells).
    pub steps: i32,
    /// Cell where the two frontiers met.
    pub meeting: (i32, i32),
}

/// Best known meeting of the two frontiers.
///
/// Writers take the mutex; the prune test reads the length mirror without
/// it. The mirror is monotonically non-increasing, so a stale read only
/// delays a prune, never breaks one.
pub(crate) struct MeetPoint {
    cell: Mutex<(i32, i32)>,
    len: AtomicI32,
}

impl MeetPoint {
    pub(crate) fn new() -> Self {
        Self {
            cell: Mutex::new((-1, -1)),
            len: AtomicI32::new(INF),
        }
    }

    /// Lock-free bound for pruning: `fwd.g + bwd.g` of the best meeting.
    #[inline(always)]
    pub(crate) fn shortest(&self) -> i32 {
        self.len.load(Ordering::Relaxed)
    }

    /// Record a candidate meeting if it beats the current best.
    pub(crate) fn offer(&self, x: i32, y: i32, len: i32) {
        let mut cell = self.cell.lock();
        if len < self.len.load(Ordering::Relaxed) {
            *cell = (x, y);
            self.len.store(len, Ordering::Release);
        }
    }

    fn cell(&self) -> (i32, i32) {
        *self.cell.lock()
    }
}

/// Everything a direction's crew shares: its node table, inboxes, counter
/// ledger, and sweep bookkeeping. The counterpart direction holds a
/// read-only view of the table for meeting detection.
pub(crate) struct DirectionState {
    pub table: NodeTable,
    pub inboxes: Box<[Inbox]>,
    pub sent: Box<[AtomicUsize]>,
    pub received: Box<[AtomicUsize]>,
    /// Crossed once per worker between seeding and the main loop.
    pub barrier: Barrier,
    /// Set when this direction went quiescent; quiescence is permanent, so
    /// the whole search ends once both directions carry this flag.
    pub done: AtomicBool,
    /// Where this direction grows from.
    pub origin: (i32, i32),
    /// Heuristic target: the counterpart's origin.
    pub target: (i32, i32),
}

impl DirectionState {
    pub(crate) fn new(
        cols: i32,
        rows: i32,
        crew: usize,
        origin: (i32, i32),
        target: (i32, i32),
    ) -> Self {
        Self {
            table: NodeTable::new(cols, rows),
            inboxes: (0..crew).map(|_| Inbox::new()).collect(),
            sent: (0..crew).map(|_| AtomicUsize::new(0)).collect(),
            received: (0..crew).map(|_| AtomicUsize::new(0)).collect(),
            barrier: Barrier::new(crew),
            done: AtomicBool::new(false),
            origin,
            target,
        }
    }
}

/// Run the bidirectional search and stamp the path into the maze.
///
/// On success the maze holds `*` along one shortest path with the `@` and
/// `%` marks intact, and the summary carries the step count. A maze whose
/// start and goal lie in different components is an error and leaves the
/// maze bytes untouched.
pub fn solve(maze: &mut MazeFile, config: &SolverConfig) -> Result<PathSummary> {
    let crew = resolve_crew(config);
    let start = maze.start();
    let goal = maze.goal();

    let forward = DirectionState::new(maze.cols(), maze.rows(), crew, start, goal);
    let backward = DirectionState::new(maze.cols(), maze.rows(), crew, goal, start);
    let meet = MeetPoint::new();
    let finished = AtomicBool::new(false);

    let mut forward_states: Vec<WorkerState> = (0..crew).map(|_| WorkerState::new()).collect();
    let mut backward_states: Vec<WorkerState> = (0..crew).map(|_| WorkerState::new()).collect();

    debug!(
        "searching {}x{} maze with {crew} workers per direction",
        maze.cols(),
        maze.rows()
    );

    let grid: &MazeFile = maze;
    thread::scope(|s| {
        let crews = [
            (&mut forward_states, &forward, &backward),
            (&mut backward_states, &backward, &forward),
        ];
        for (states, dir, other) in crews {
            for (id, state) in states.iter_mut().enumerate() {
                let worker = Worker {
                    id,
                    crew,
                    grid,
                    dir,
                    other,
                    meet: &meet,
                    finished: &finished,
                };
                s.spawn(move || worker.run(state));
            }
        }
    });

    let shortest = meet.shortest();
    if shortest == INF {
        bail!("maze has no path between start and goal");
    }
    let (mx, my) = meet.cell();

    maze.mark(mx, my, b'*');
    stamp_chain(maze, &forward.table, mx, my);
    stamp_chain(maze, &backward.table, mx, my);
    maze.mark(start.0, start.1, b'@');
    maze.mark(goal.0, goal.1, b'%');

    // Both origins were seeded with g = 1, so the meeting sum overcounts
    // the edge count by exactly two.
    let steps = shortest - 2;
    info!("frontiers met at ({mx}, {my}); path is {steps} steps");
    Ok(PathSummary {
        steps,
        meeting: (mx, my),
    })
}

/// Walk one direction's parent chain from the meeting cell, stamping `*`.
fn stamp_chain(maze: &mut MazeFile, table: &NodeTable, x: i32, y: i32) {
    let meeting: *mut Node = table.get(x, y);
    assert!(
        !meeting.is_null(),
        "meeting cell was not discovered by both frontiers"
    );
    // SAFETY: every worker has joined; nodes and parent links are frozen.
    let mut node = unsafe { (*meeting).parent };
    while !node.is_null() {
        unsafe {
            maze.mark((*node).x, (*node).y, b'*');
            node = (*node).parent;
        }
    }
}
