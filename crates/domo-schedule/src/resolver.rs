//! Schedule resolution
//!
//! Turns the schedule document plus a date into resolved entries. The
//! document is held as an atomically swapped immutable snapshot: resolution
//! always reads one consistent document, and hot reload replaces the whole
//! snapshot instead of mutating in place.

use crate::error::{ScheduleError, ScheduleResult};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use domo_config::{ScheduleDocument, ScheduleEntry};
use domo_core::time::hhmm;
use domo_core::{format_hhmm, Action, TimerRequest};
use domo_executor::Executor;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Leaf-peeling iterations allowed before a `replaces` cycle is assumed.
const REPLACES_ITERATION_BOUND: usize = 10;

/// Template references may nest this deep before resolution gives up.
const TEMPLATE_DEPTH_LIMIT: usize = 8;

/// A concrete, location-filtered unit of work ready for dispatch.
///
/// `locations` is never empty: entries no output anywhere is interested in
/// are dropped during resolution rather than emitted empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntry {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub locations: HashSet<String>,
    pub actions: Vec<Action>,
}

struct ResolverInner {
    document: RwLock<Arc<ScheduleDocument>>,
    executor: Executor,
}

/// Resolves schedule documents against dates. Cheap to clone; clones share
/// the document snapshot.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

impl Resolver {
    pub fn new(document: ScheduleDocument, executor: Executor) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                document: RwLock::new(Arc::new(document)),
                executor,
            }),
        }
    }

    /// The current document snapshot.
    pub fn document(&self) -> Arc<ScheduleDocument> {
        self.inner
            .document
            .read()
            .expect("document lock poisoned")
            .clone()
    }

    /// Replace the whole document (hot reload). Resolutions already running
    /// keep their old snapshot; new ones see the new document.
    pub fn set_document(&self, document: ScheduleDocument) {
        info!(
            days = document.day.len(),
            templates = document.template.len(),
            "installing new schedule document"
        );
        *self
            .inner
            .document
            .write()
            .expect("document lock poisoned") = Arc::new(document);
    }

    /// Names of the days applying to `date`, in document order, after
    /// resolving the `replaces` override relation.
    pub fn get_days_for_date(&self, date: NaiveDate) -> ScheduleResult<Vec<String>> {
        let document = self.document();
        let mut selected: Vec<String> = Vec::new();

        for (name, day) in &document.day {
            if day.disabled {
                continue;
            }
            let matches = match &day.when {
                None => true,
                Some(when) => {
                    let weekday_ok = when.days_of_week.is_empty()
                        || when.days_of_week.contains(&date.weekday());
                    let date_ok = when.dates.is_empty()
                        || when.dates.iter().any(|span| span.contains(date));
                    weekday_ok && date_ok
                }
            };
            if matches {
                debug!(day = %name, "day selected");
                selected.push(name.clone());
            }
        }

        // Index the reverse relation: who replaces whom, among the selected.
        let mut replaced_by: Vec<(String, Vec<String>)> = selected
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        for name in &selected {
            for target in &document.day[name].replaces {
                if let Some((_, list)) = replaced_by.iter_mut().find(|(n, _)| n == target) {
                    list.push(name.clone());
                }
            }
        }

        // Peel leaves: a day nothing remaining replaces is staying, so every
        // day it replaces goes away, together with all references to it.
        let mut iterations = 0;
        while !replaced_by.is_empty() && iterations < REPLACES_ITERATION_BOUND {
            iterations += 1;

            let names: Vec<String> = replaced_by.iter().map(|(n, _)| n.clone()).collect();
            for name in names {
                let Some((_, incoming)) = replaced_by.iter().find(|(n, _)| *n == name) else {
                    continue;
                };
                if !incoming.is_empty() {
                    continue;
                }

                for target in document.day[&name].replaces.clone() {
                    debug!(day = %target, replaced_by = %name, "day replaced");
                    for (_, list) in replaced_by.iter_mut() {
                        list.retain(|n| *n != target);
                    }
                    replaced_by.retain(|(n, _)| *n != target);
                    selected.retain(|n| *n != target);
                }

                replaced_by.retain(|(n, _)| *n != name);
            }
        }

        if !replaced_by.is_empty() {
            return Err(ScheduleError::CircularReplaces {
                days: replaced_by.into_iter().map(|(n, _)| n).collect(),
            });
        }

        Ok(selected)
    }

    /// The full resolved schedule for `date`, ordered by time.
    pub fn get_schedule_for_date(&self, date: NaiveDate) -> ScheduleResult<Vec<ResolvedEntry>> {
        let document = self.document();
        let days = self.get_days_for_date(date)?;
        info!(?days, %date, "resolving schedule");

        let mut result = Vec::new();
        for day_name in &days {
            let day = &document.day[day_name];
            let mut prev_time = None;
            for entry in &day.schedule {
                prev_time = self.parse_entry(
                    &document,
                    date,
                    prev_time,
                    &day.locations,
                    entry,
                    None,
                    0,
                    day_name,
                    &mut result,
                )?;
            }
        }

        // Stable: ties keep day/entry document order.
        result.sort_by_key(|entry| entry.time);
        Ok(result)
    }

    /// Expand a template against an ad hoc anchor (for `template` actions),
    /// without registering anything with the driver.
    pub fn expand_template_at(
        &self,
        date: NaiveDate,
        anchor: NaiveTime,
        locations: &HashSet<String>,
        name: &str,
    ) -> ScheduleResult<Vec<ResolvedEntry>> {
        let document = self.document();
        let mut result = Vec::new();
        self.expand_template(&document, date, anchor, locations, name, 0, &mut result)?;
        Ok(result)
    }

    fn expand_template(
        &self,
        document: &ScheduleDocument,
        date: NaiveDate,
        anchor: NaiveTime,
        locations: &HashSet<String>,
        name: &str,
        depth: usize,
        out: &mut Vec<ResolvedEntry>,
    ) -> ScheduleResult<()> {
        if depth >= TEMPLATE_DEPTH_LIMIT {
            return Err(ScheduleError::TemplateTooDeep {
                name: name.to_string(),
                limit: TEMPLATE_DEPTH_LIMIT,
            });
        }
        let template = document
            .template
            .get(name)
            .ok_or_else(|| ScheduleError::UnknownTemplate { name: name.to_string() })?;

        let mut prev_time = None;
        for entry in &template.schedule {
            prev_time = self.parse_entry(
                document,
                date,
                prev_time,
                locations,
                entry,
                Some(anchor),
                depth,
                name,
                out,
            )?;
        }
        Ok(())
    }

    /// Resolve one entry, appending its resolved entries to `out`. Returns
    /// the time used as the next sibling's `prev_time` anchor.
    #[allow(clippy::too_many_arguments)]
    fn parse_entry(
        &self,
        document: &ScheduleDocument,
        date: NaiveDate,
        prev_time: Option<NaiveTime>,
        locations: &HashSet<String>,
        entry: &ScheduleEntry,
        time_offset: Option<NaiveTime>,
        depth: usize,
        context: &str,
        out: &mut Vec<ResolvedEntry>,
    ) -> ScheduleResult<Option<NaiveTime>> {
        let mut scope = locations.clone();
        if let Some(narrowed) = &entry.locations {
            scope.retain(|location| narrowed.contains(location));
        }
        if let Some(excluded) = &entry.locations_exclude {
            scope.retain(|location| !excluded.contains(location));
        }

        let parsed_time = match time_offset {
            None => entry.time,
            Some(anchor) => {
                // Entry times inside a template are offsets from the anchor.
                let resolved = date.and_time(anchor)
                    + Duration::hours(entry.time.hour() as i64)
                    + Duration::minutes(entry.time.minute() as i64);
                if resolved.date() != date {
                    // Templates do not spill across midnight.
                    warn!(
                        context,
                        time = %resolved,
                        "template entry crosses midnight; dropping"
                    );
                    return Ok(prev_time);
                }
                resolved.time()
            }
        };

        if let Some(template_name) = &entry.template {
            self.expand_template(
                document,
                date,
                parsed_time,
                &scope,
                template_name,
                depth + 1,
                out,
            )?;
        }

        let mut required_locations = HashSet::new();
        let mut required_actions = Vec::new();
        for action in &entry.actions {
            let locations_for_action = self
                .inner
                .executor
                .action_required_for_locations(&scope, action);
            if !locations_for_action.is_empty() {
                required_locations.extend(locations_for_action);
                required_actions.push(action.clone());
            }
        }

        if !required_actions.is_empty() {
            out.push(ResolvedEntry {
                time: parsed_time,
                locations: required_locations.clone(),
                actions: required_actions,
            });

            if let Some(marker) = &entry.timer {
                let start = prev_time.ok_or_else(|| ScheduleError::TimerMarkerWithoutAnchor {
                    context: context.to_string(),
                    time: format_hhmm(parsed_time),
                })?;
                let request = TimerRequest {
                    name: marker.name.clone().unwrap_or_else(|| "default".to_string()),
                    minutes: None,
                    end_time: Some(parsed_time),
                    replace: true,
                    cancel: false,
                };
                out.push(ResolvedEntry {
                    time: start,
                    locations: required_locations,
                    actions: vec![Action::Timer(request)],
                });
            }
        }

        Ok(Some(parsed_time))
    }
}
