//! Action router, per-location delivery queues and countdown timers
//!
//! The `Executor` owns the registered outputs, one serialized delivery queue
//! per known location, and the table of active named timers. Routing asks
//! every output whether it needs an action at each location; delivery fans
//! an action out to all outputs concurrently, one action at a time per
//! location. Actions for different locations proceed fully in parallel;
//! a failure on one location's queue never affects another.

mod timer;

use domo_core::{Action, TimerRequest};
use domo_output::Output;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace, warn};

pub use timer::TimerSettings;

use timer::TimerHandle;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors reported back to callers injecting actions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// A same-named timer is running and the request carried no
    /// `replace`/`cancel` flag.
    #[error("timer '{name}' is already running")]
    TimerAlreadyRunning { name: String },

    /// A timer start carried neither `minutes` nor `end_time`.
    #[error("timer '{name}' needs either minutes or an end_time")]
    TimerMissingDuration { name: String },

    /// A timer start carried both `minutes` and `end_time`.
    #[error("timer '{name}' cannot carry both minutes and an end_time")]
    TimerAmbiguousDuration { name: String },

    /// The requested `end_time` does not exist on the local calendar today.
    #[error("timer '{name}' end_time is not a valid local time today")]
    TimerInvalidEndTime { name: String },

    /// Nobody is consuming template activations anymore.
    #[error("template activation channel closed")]
    TemplateChannelClosed,
}

/// A request to activate a named template at some locations, emitted when a
/// `template` action reaches the executor and consumed by the scheduler
/// driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateActivation {
    pub locations: HashSet<String>,
    pub name: String,
}

pub(crate) struct ExecutorInner {
    pub(crate) outputs: Vec<Arc<dyn Output>>,
    /// One queue per known location, frozen at startup.
    queues: HashMap<String, mpsc::UnboundedSender<Action>>,
    /// Active timers by name. Guarded by one lock so checking "is this name
    /// running" and acting on it is atomic.
    pub(crate) timers: Mutex<HashMap<String, TimerHandle>>,
    pub(crate) timer_settings: TimerSettings,
    pub(crate) next_timer_id: AtomicU64,
    templates: mpsc::UnboundedSender<TemplateActivation>,
}

/// The action router and delivery engine. Cheap to clone; all clones share
/// the same queues, outputs and timer table.
#[derive(Clone)]
pub struct Executor {
    pub(crate) inner: Arc<ExecutorInner>,
}

impl Executor {
    /// Build an executor for a fixed location set, spawning one delivery
    /// worker per location. Returns the receiver for template activations.
    pub fn new(
        outputs: Vec<Arc<dyn Output>>,
        locations: impl IntoIterator<Item = String>,
        timer_settings: TimerSettings,
    ) -> (Self, mpsc::UnboundedReceiver<TemplateActivation>) {
        let (templates, template_rx) = mpsc::unbounded_channel();

        let mut queues = HashMap::new();
        for location in locations {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(location_worker(location.clone(), rx, outputs.clone()));
            queues.insert(location, tx);
        }

        let executor = Self {
            inner: Arc::new(ExecutorInner {
                outputs,
                queues,
                timers: Mutex::new(HashMap::new()),
                timer_settings,
                next_timer_id: AtomicU64::new(1),
                templates,
            }),
        };
        (executor, template_rx)
    }

    /// The locations that need `action` delivered.
    ///
    /// `timer` and `template` actions drive scheduling state, not devices, so
    /// they propagate to the full requested set regardless of output
    /// capabilities. Everything else keeps only the locations some output
    /// has a use for.
    pub fn action_required_for_locations(
        &self,
        locations: &HashSet<String>,
        action: &Action,
    ) -> HashSet<String> {
        if action.is_scheduling() {
            return locations.clone();
        }

        locations
            .iter()
            .filter(|location| {
                self.inner
                    .outputs
                    .iter()
                    .any(|output| output.is_action_required_for_location(location, action))
            })
            .cloned()
            .collect()
    }

    /// Route one action: timers to the timer table, templates to the
    /// activation channel, everything else onto the per-location queues.
    /// An action no output wants anywhere is a silent no-op.
    pub async fn do_action(
        &self,
        locations: &HashSet<String>,
        action: &Action,
    ) -> ExecutorResult<()> {
        let required = self.action_required_for_locations(locations, action);
        if required.is_empty() {
            trace!(tag = action.tag(), "no output wants action; skipping");
            return Ok(());
        }

        match action {
            Action::Timer(request) => self.handle_timer(required, request).await,
            Action::Template(template) => self.request_template(required, &template.name),
            _ => {
                self.enqueue(&required, action);
                Ok(())
            }
        }
    }

    /// Apply `do_action` to each action in order. Every action is attempted;
    /// the first error is returned after the rest have been processed, so a
    /// rejected timer does not swallow its companion actions.
    pub async fn do_actions(
        &self,
        locations: &HashSet<String>,
        actions: &[Action],
    ) -> ExecutorResult<()> {
        let mut first_error = None;
        for action in actions {
            if let Err(error) = self.do_action(locations, action).await {
                warn!(tag = action.tag(), %error, "action rejected");
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Whether a timer of this name is currently running.
    pub async fn is_timer_running(&self, name: &str) -> bool {
        self.inner.timers.lock().await.contains_key(name)
    }

    fn request_template(&self, locations: HashSet<String>, name: &str) -> ExecutorResult<()> {
        debug!(template = name, "requesting template activation");
        self.inner
            .templates
            .send(TemplateActivation {
                locations,
                name: name.to_string(),
            })
            .map_err(|_| ExecutorError::TemplateChannelClosed)
    }

    /// Deliver a timer broadcast straight onto the per-location queues.
    ///
    /// Broadcasts are never scheduling actions, so the timer tasks skip
    /// `do_action` and only apply the routing filter before enqueueing.
    pub(crate) fn broadcast(&self, locations: &HashSet<String>, action: &Action) {
        let required = self.action_required_for_locations(locations, action);
        if required.is_empty() {
            trace!(tag = action.tag(), "no output wants broadcast; skipping");
            return;
        }
        self.enqueue(&required, action);
    }

    fn enqueue(&self, locations: &HashSet<String>, action: &Action) {
        for location in locations {
            match self.inner.queues.get(location) {
                Some(queue) => {
                    trace!(location, tag = action.tag(), "enqueueing action");
                    // The worker holds the receiver for the process lifetime.
                    let _ = queue.send(action.clone());
                }
                None => {
                    warn!(location, tag = action.tag(), "no queue for location; skipping");
                }
            }
        }
    }

    async fn handle_timer(
        &self,
        locations: HashSet<String>,
        request: &TimerRequest,
    ) -> ExecutorResult<()> {
        timer::handle_timer(self, locations, request).await
    }
}

/// One long-lived worker per location: pull the next action, fan it out to
/// every output concurrently, log failures, keep going. Delivery order per
/// location is strict submission order.
async fn location_worker(
    location: String,
    mut queue: mpsc::UnboundedReceiver<Action>,
    outputs: Vec<Arc<dyn Output>>,
) {
    debug!(location, "location worker started");

    while let Some(action) = queue.recv().await {
        trace!(location, tag = action.tag(), "delivering action");

        let results = join_all(
            outputs
                .iter()
                .map(|output| output.execute(&location, &action)),
        )
        .await;

        for (output, result) in outputs.iter().zip(results) {
            if let Err(error) = result {
                warn!(
                    location,
                    output = output.name(),
                    %error,
                    "output failed; worker continues"
                );
            }
        }
    }

    debug!(location, "location worker stopped");
}
