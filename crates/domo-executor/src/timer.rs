//! Countdown timer state machine
//!
//! A timer is a per-name task broadcasting minute-granularity countdown
//! actions through the executor until expiry or cancellation. All wall-clock
//! math is anchored in absolute epoch time recomputed every iteration, so
//! scheduling jitter never drifts the displayed time left. Each cycle the
//! task sleeps to a few seconds before the next whole-minute boundary,
//! broadcasts a `timer_warn`, sleeps to the boundary itself and broadcasts a
//! `timer_status`. When the next boundary is expiry there is nothing left to
//! announce and the task sleeps straight through to the end.

use crate::{Executor, ExecutorError, ExecutorResult};
use domo_core::{Action, TimerBroadcast, TimerCancelled, TimerRequest};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Timing parameters for timers. The defaults are real minutes; tests scale
/// the unit down to keep the broadcast sequence observable in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct TimerSettings {
    /// Length of one countdown "minute".
    pub minute: Duration,
    /// How long before a minute boundary the warning broadcast goes out.
    pub early_warning: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            minute: Duration::from_secs(60),
            early_warning: Duration::from_secs(3),
        }
    }
}

/// Table entry for a running timer. The generation id keeps a replaced
/// timer's cleanup from evicting its successor.
pub(crate) struct TimerHandle {
    id: u64,
    cancel: watch::Sender<bool>,
}

fn epoch_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

async fn sleep_until_epoch(target: f64) {
    let wait = (target - epoch_now()).max(0.0);
    debug!(seconds = wait, "timer sleeping");
    tokio::time::sleep(Duration::from_secs_f64(wait)).await;
}

/// Start, replace or cancel the timer named in `request`. Runs under the
/// timer-table lock so two simultaneous starts for one name cannot both win.
pub(crate) async fn handle_timer(
    executor: &Executor,
    locations: HashSet<String>,
    request: &TimerRequest,
) -> ExecutorResult<()> {
    let name = request.name.clone();
    let mut timers = executor.inner.timers.lock().await;

    if let Some(existing) = timers.remove(&name) {
        if request.replace || request.cancel {
            info!(timer = %name, "already running, cancelling old one");
            let _ = existing.cancel.send(true);
        } else {
            info!(timer = %name, "already running, not starting");
            timers.insert(name.clone(), existing);
            return Err(ExecutorError::TimerAlreadyRunning { name });
        }
    }

    // A bare cancel stops the old timer without starting a new one.
    if request.cancel {
        return Ok(());
    }

    let settings = executor.inner.timer_settings;
    let now = epoch_now();
    let stop_epoch = match (request.minutes, request.end_time) {
        (Some(minutes), None) => now + minutes as f64 * settings.minute.as_secs_f64(),
        (None, Some(end_time)) => {
            let date = chrono::Local::now().date_naive();
            date.and_time(end_time)
                .and_local_timezone(chrono::Local)
                .earliest()
                .map(|stop| stop.timestamp() as f64)
                .ok_or(ExecutorError::TimerInvalidEndTime { name: name.clone() })?
        }
        (None, None) => return Err(ExecutorError::TimerMissingDuration { name }),
        (Some(_), Some(_)) => return Err(ExecutorError::TimerAmbiguousDuration { name }),
    };

    let id = executor.inner.next_timer_id.fetch_add(1, Ordering::SeqCst);
    let (cancel, cancel_rx) = watch::channel(false);
    timers.insert(name.clone(), TimerHandle { id, cancel });
    drop(timers);

    tokio::spawn(run_timer(
        executor.clone(),
        id,
        name,
        locations,
        stop_epoch,
        cancel_rx,
    ));
    Ok(())
}

enum Outcome {
    Expired,
    Cancelled,
    Crashed,
}

/// Drive one timer to completion, convert cancellation and crashes into a
/// `timer_cancel` broadcast, and always free the name.
///
/// The countdown runs as its own task so a panic inside it surfaces here as
/// a join error instead of leaving the name stuck in the table.
async fn run_timer(
    executor: Executor,
    id: u64,
    name: String,
    locations: HashSet<String>,
    stop_epoch: f64,
    mut cancelled: watch::Receiver<bool>,
) {
    let mut countdown = tokio::spawn(timer_loop(
        executor.clone(),
        name.clone(),
        locations.clone(),
        stop_epoch,
    ));

    let outcome = tokio::select! {
        result = &mut countdown => match result {
            Ok(()) => Outcome::Expired,
            Err(error) => {
                error!(timer = %name, %error, "timer loop failed");
                Outcome::Crashed
            }
        },
        _ = cancelled.changed() => {
            countdown.abort();
            Outcome::Cancelled
        }
    };

    let message = match outcome {
        Outcome::Expired => None,
        Outcome::Cancelled => Some("Cancelled."),
        Outcome::Crashed => Some("Crashed."),
    };
    if let Some(message) = message {
        info!(timer = %name, message, "timer cancelled");
        let action = Action::TimerCancel(TimerCancelled {
            name: name.clone(),
            message: message.to_string(),
        });
        executor.broadcast(&locations, &action);
    }

    // Free the name, unless a replacement already took it over.
    let mut timers = executor.inner.timers.lock().await;
    if timers.get(&name).map(|handle| handle.id) == Some(id) {
        timers.remove(&name);
    }
}

async fn timer_loop(
    executor: Executor,
    name: String,
    locations: HashSet<String>,
    stop_epoch: f64,
) {
    let settings = executor.inner.timer_settings;
    let minute = settings.minute.as_secs_f64();
    let early_warning = settings.early_warning.as_secs_f64();

    let now = epoch_now();
    let time_total = ((stop_epoch - now) / minute).ceil().max(0.0) as i64;
    info!(timer = %name, minutes = time_total, "timer started");

    let mut next_minute = now;
    loop {
        let now = epoch_now();
        if stop_epoch - now <= 0.0 {
            break;
        }

        let time_left = ((stop_epoch - now) / minute).ceil() as i64;
        let status = TimerBroadcast {
            name: name.clone(),
            time_left,
            time_total,
            epoch_minute: next_minute.round() as i64,
            epoch_finish: stop_epoch.round() as i64,
        };
        executor.broadcast(&locations, &Action::TimerStatus(status));

        // Anchor the next whole-minute boundary to absolute time.
        let now = epoch_now();
        let remaining = stop_epoch - now;
        let mut to_boundary = remaining % minute;
        if to_boundary <= 0.0 {
            to_boundary = minute;
        }
        next_minute = now + to_boundary;

        // When the next boundary is expiry itself there is nothing more to
        // announce before the end.
        if remaining <= to_boundary + 1e-6 {
            sleep_until_epoch(stop_epoch).await;
            continue;
        }

        sleep_until_epoch(next_minute - early_warning).await;
        let now = epoch_now();
        let warn = TimerBroadcast {
            name: name.clone(),
            time_left: ((stop_epoch - now - early_warning) / minute).ceil() as i64,
            time_total,
            epoch_minute: next_minute.round() as i64,
            epoch_finish: stop_epoch.round() as i64,
        };
        executor.broadcast(&locations, &Action::TimerWarn(warn));

        sleep_until_epoch(next_minute).await;
    }

    info!(timer = %name, minutes = time_total, "timer expired");
}
