//! Scheduler driver
//!
//! Thin loop firing resolved entries at their wall-clock minute. It
//! re-resolves at day rollover, re-plans when poked (hot reload), and
//! consumes template activations coming back from the executor: entries for
//! the current minute fire immediately, later ones overlay today's plan.

use crate::error::ScheduleResult;
use crate::resolver::{ResolvedEntry, Resolver};
use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use domo_executor::{Executor, TemplateActivation};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

/// The scheduler driver.
pub struct Dispatcher {
    resolver: Resolver,
    executor: Executor,
    templates: mpsc::UnboundedReceiver<TemplateActivation>,
    replan: Arc<Notify>,
    /// Ad hoc entries registered for a specific date by template activation.
    overlay: Vec<(NaiveDate, ResolvedEntry)>,
}

impl Dispatcher {
    pub fn new(
        resolver: Resolver,
        executor: Executor,
        templates: mpsc::UnboundedReceiver<TemplateActivation>,
    ) -> Self {
        Self {
            resolver,
            executor,
            templates,
            replan: Arc::new(Notify::new()),
            overlay: Vec::new(),
        }
    }

    /// Handle used to force a re-plan (after a document hot reload).
    pub fn replan_handle(&self) -> Arc<Notify> {
        self.replan.clone()
    }

    /// Run forever. Returns only on a fatal configuration error.
    pub async fn run(mut self) -> ScheduleResult<()> {
        loop {
            let now = Local::now();
            let today = now.date_naive();

            self.overlay.retain(|(date, _)| *date == today);

            let mut plan = self.resolver.get_schedule_for_date(today)?;
            plan.extend(
                self.overlay
                    .iter()
                    .map(|(_, entry)| entry.clone()),
            );
            plan.sort_by_key(|entry| entry.time);
            info!(date = %today, entries = plan.len(), "schedule planned");

            // Entries at or before the current time have had their moment.
            let mut index = first_pending(&plan, now.time());

            loop {
                let now = Local::now();
                if now.date_naive() != today {
                    break;
                }

                let deadline = match plan.get(index) {
                    Some(entry) => today.and_time(entry.time),
                    // Nothing left today: wait for midnight, then re-resolve.
                    None => match today.succ_opt() {
                        Some(tomorrow) => tomorrow.and_time(NaiveTime::MIN),
                        None => {
                            error!("calendar overflow; stopping dispatcher");
                            return Ok(());
                        }
                    },
                };
                let wait = (deadline - now.naive_local())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                debug!(?deadline, ?wait, "dispatcher sleeping");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if index >= plan.len() {
                            break; // day rollover
                        }
                        let due_time = plan[index].time;
                        while index < plan.len() && plan[index].time == due_time {
                            self.fire(&plan[index]).await;
                            index += 1;
                        }
                    }
                    _ = self.replan.notified() => {
                        debug!("re-planning requested");
                        break;
                    }
                    activation = self.templates.recv() => {
                        match activation {
                            Some(activation) => {
                                self.activate_template(activation).await;
                                break; // merge the overlay into a fresh plan
                            }
                            None => {
                                info!("executor gone; stopping dispatcher");
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }

    async fn fire(&self, entry: &ResolvedEntry) {
        info!(time = %entry.time, locations = ?entry.locations, "waking up for entry");
        if let Err(error) = self
            .executor
            .do_actions(&entry.locations, &entry.actions)
            .await
        {
            warn!(%error, "entry actions reported an error");
        }
    }

    /// Expand a template against the current minute: due entries fire
    /// immediately, future ones are registered for today.
    async fn activate_template(&mut self, activation: TemplateActivation) {
        let now = Local::now();
        let date = now.date_naive();
        let minute = minute_of(now.time());

        let entries = match self.resolver.expand_template_at(
            date,
            minute,
            &activation.locations,
            &activation.name,
        ) {
            Ok(entries) => entries,
            Err(error) => {
                error!(template = %activation.name, %error, "template activation failed");
                return;
            }
        };

        for entry in entries {
            if entry.time == minute {
                self.fire(&entry).await;
            } else if entry.time > minute {
                debug!(time = %entry.time, "registering ad hoc entry");
                self.overlay.push((date, entry));
            }
        }
    }
}

/// Index of the first entry strictly after `now`.
fn first_pending(plan: &[ResolvedEntry], now: NaiveTime) -> usize {
    plan.iter().position(|entry| entry.time > now).unwrap_or(plan.len())
}

fn minute_of(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|time| time.with_nanosecond(0))
        .unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domo_core::{Action, Message};
    use std::collections::HashSet;

    fn entry(time: NaiveTime) -> ResolvedEntry {
        ResolvedEntry {
            time,
            locations: HashSet::from(["bedroom".to_string()]),
            actions: vec![Action::Message(Message { text: "x".into() })],
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_first_pending_skips_past_entries() {
        let plan = vec![entry(at(6, 30)), entry(at(7, 0)), entry(at(21, 30))];

        assert_eq!(first_pending(&plan, at(0, 0)), 0);
        assert_eq!(first_pending(&plan, at(6, 30)), 1);
        assert_eq!(first_pending(&plan, at(6, 45)), 1);
        assert_eq!(first_pending(&plan, at(22, 0)), 3);
    }

    #[test]
    fn test_minute_of_truncates() {
        let time = NaiveTime::from_hms_milli_opt(7, 10, 42, 137).unwrap();
        assert_eq!(minute_of(time), at(7, 10));
    }
}
