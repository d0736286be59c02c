//! Lock-order dependency tracker ("lockdep").
//!
//! The tracker keeps, per thread, the stack of locks that thread currently
//! holds. Whenever a thread is about to block on a lock, every lock it
//! already holds gains an acquired-before edge to the new one. When a new
//! edge closes a cycle in the graph formed by all threads' edges, two threads
//! can deadlock by taking the same locks in opposite orders, and a
//! [`CycleReport`] goes to the configured [`ReportSink`].
//!
//! The tracker only observes. It never delays or fails an acquisition, and it
//! knows locks only through the [`LockObserver`] hooks.
//!
//! # Configuration
//!
//! [`Lockdep::global`] is initialized on first use from the environment:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `TANGLE_LOCKDEP` | `0`/`off`/`false` turns tracking off (default on) |
//! | `TANGLE_LOCKDEP_KEY` | `instance` (default) or `name` |
//! | `TANGLE_LOCKDEP_BACKTRACE` | `1`/`on`/`true` captures a backtrace for each new edge |

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tangle_types::{CycleReport, LockId, LockLabel, LockObserver, LockRef};

mod config;
mod graph;
mod sink;

pub use config::{
    ConfigError, ENV_LOCKDEP, ENV_LOCKDEP_BACKTRACE, ENV_LOCKDEP_KEY, Keying, LockdepConfig,
};
pub use sink::{CollectingSink, ReportSink, TracingSink};

use graph::{EdgeOrigin, OrderGraph};


// ── Graph node identity ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NodeKey {
    Instance { id: LockId, name: &'static str },
    Class(&'static str),
}

impl NodeKey {
    fn label(self) -> LockLabel {
        match self {
            Self::Instance { id, name } => LockLabel::instance(id, name),
            Self::Class(name) => LockLabel::class(name),
        }
    }
}

/// An acquired-before edge as recorded by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEdge {
    pub before: LockLabel,
    pub after: LockLabel,
    /// Thread that first took `after` while holding `before`.
    pub thread: String,
}

// ── Tracker state ───────────────────────────────────────

struct State {
    graph: OrderGraph<NodeKey>,
    held: HashMap<ThreadId, Vec<LockRef>>,
}

pub struct Lockdep {
    config: LockdepConfig,
    state: Mutex<State>,
    sink: Box<dyn ReportSink>,
    reports_emitted: AtomicU64,
}

impl Lockdep {
    pub fn new(config: LockdepConfig) -> Self {
        Self::with_sink(config, TracingSink)
    }

    pub fn with_sink(config: LockdepConfig, sink: impl ReportSink + 'static) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                graph: OrderGraph::new(),
                held: HashMap::new(),
            }),
            sink: Box::new(sink),
            reports_emitted: AtomicU64::new(0),
        }
    }

    /// The process-wide tracker, configured from the environment on first
    /// use. An invalid environment is logged and replaced by the defaults.
    pub fn global() -> &'static Lockdep {
        static GLOBAL: OnceLock<Lockdep> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = config_or_default(LockdepConfig::from_env());
            tracing::debug!(?config, "lockdep initialized");
            Lockdep::new(config)
        })
    }

    pub fn config(&self) -> &LockdepConfig {
        &self.config
    }

    pub fn reports_emitted(&self) -> u64 {
        self.reports_emitted.load(Ordering::Relaxed)
    }

    /// Locks the calling thread holds, outermost first. A recursively held
    /// lock appears once per level.
    pub fn held_by_current_thread(&self) -> Vec<LockRef> {
        let state = self.state.lock();
        state
            .held
            .get(&thread::current().id())
            .cloned()
            .unwrap_or_default()
    }

    pub fn edges(&self) -> Vec<RecordedEdge> {
        let state = self.state.lock();
        state
            .graph
            .edges()
            .map(|(before, after, origin)| RecordedEdge {
                before: before.label(),
                after: after.label(),
                thread: origin.thread.clone(),
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.state.lock().graph.edge_count()
    }

    /// Forgets every recorded edge and every held stack.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.graph.clear();
        state.held.clear();
    }

    fn key(&self, lock: LockRef) -> NodeKey {
        match self.config.keying {
            Keying::Instance => NodeKey::Instance {
                id: lock.id,
                name: lock.name,
            },
            Keying::Name => NodeKey::Class(lock.name),
        }
    }

    fn record_order(&self, lock: LockRef) -> Vec<CycleReport> {
        let acquiring = self.key(lock);
        let current = thread::current();
        let thread_name = thread_label(&current);

        let mut state = self.state.lock();
        let Some(stack) = state.held.get(&current.id()) else {
            return Vec::new();
        };
        // re-entering a lock this thread holds cannot block
        if stack.iter().any(|entry| entry.id == lock.id) {
            return Vec::new();
        }

        let mut held: Vec<NodeKey> = Vec::with_capacity(stack.len());
        for &entry in stack {
            let key = self.key(entry);
            if key != acquiring && !held.contains(&key) {
                held.push(key);
            }
        }

        let mut backtrace: Option<String> = None;
        let mut reports = Vec::new();
        for before in held {
            if state.graph.contains_edge(before, acquiring) {
                continue;
            }
            if self.config.capture_backtraces && backtrace.is_none() {
                backtrace = Some(Backtrace::force_capture().to_string());
            }

            if let Some(path) = state.graph.path(acquiring, before) {
                let mut cycle = Vec::with_capacity(path.len() + 1);
                cycle.push(before.label());
                cycle.extend(path.into_iter().map(NodeKey::label));
                reports.push(CycleReport {
                    thread: thread_name.clone(),
                    held: before.label(),
                    acquiring: acquiring.label(),
                    cycle,
                    backtrace: backtrace.clone(),
                });
            }

            tracing::debug!(
                before = %before.label(),
                after = %acquiring.label(),
                thread = %thread_name,
                "new lock-order edge"
            );
            state.graph.add_edge(
                before,
                acquiring,
                EdgeOrigin {
                    thread: thread_name.clone(),
                    backtrace: backtrace.clone(),
                },
            );
        }

        reports
    }
}

impl LockObserver for Lockdep {
    fn on_will_acquire(&self, lock: LockRef) {
        if !self.config.enabled {
            return;
        }
        let reports = self.record_order(lock);
        for report in &reports {
            self.reports_emitted.fetch_add(1, Ordering::Relaxed);
            self.sink.report(report);
        }
    }

    fn on_acquired(&self, lock: LockRef) {
        if !self.config.enabled {
            return;
        }
        let mut state = self.state.lock();
        state
            .held
            .entry(thread::current().id())
            .or_default()
            .push(lock);
    }

    fn on_released(&self, lock: LockRef) {
        if !self.config.enabled {
            return;
        }
        let thread_id = thread::current().id();
        let mut state = self.state.lock();
        let Some(stack) = state.held.get_mut(&thread_id) else {
            tracing::warn!(%lock, "released a lock this thread was never seen acquiring");
            return;
        };
        match stack.iter().rposition(|entry| entry.id == lock.id) {
            Some(index) => {
                stack.remove(index);
            }
            None => {
                tracing::warn!(%lock, "released a lock this thread was never seen acquiring");
            }
        }
        if stack.is_empty() {
            state.held.remove(&thread_id);
        }
    }

    fn on_retired(&self, lock: LockRef) {
        if !self.config.enabled {
            return;
        }
        let mut state = self.state.lock();
        state.held.retain(|_, stack| {
            stack.retain(|entry| entry.id != lock.id);
            !stack.is_empty()
        });
        if self.config.keying == Keying::Instance {
            let key = self.key(lock);
            state.graph.remove_node(key);
        }
    }
}

fn config_or_default(parsed: Result<LockdepConfig, ConfigError>) -> LockdepConfig {
    parsed.unwrap_or_else(|e| {
        tracing::warn!(%e, "invalid lockdep configuration, using defaults");
        LockdepConfig::default()
    })
}

fn thread_label(thread: &thread::Thread) -> String {
    match thread.name() {
        Some(name) => name.to_owned(),
        None => format!("{:?}", thread.id()),
    }
}
