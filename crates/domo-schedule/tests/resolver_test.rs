//! Resolution tests against complete schedule documents
//!
//! These build a real executor with stub outputs so the resolver's location
//! filtering runs against the same routing predicate production uses.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use domo_config::ScheduleDocument;
use domo_core::Action;
use domo_executor::{Executor, TimerSettings};
use domo_output::{Output, OutputError};
use domo_schedule::{Resolver, ScheduleError};
use std::collections::HashSet;
use std::sync::Arc;

/// Declares interest in a fixed location set, optionally narrowed to a tag
/// list, and does nothing on execute.
struct StubOutput {
    locations: HashSet<String>,
    tags: Option<HashSet<&'static str>>,
}

impl StubOutput {
    fn new(locations: &[&str], tags: Option<&[&'static str]>) -> Arc<dyn Output> {
        Arc::new(Self {
            locations: locations.iter().map(|s| s.to_string()).collect(),
            tags: tags.map(|tags| tags.iter().copied().collect()),
        })
    }
}

#[async_trait]
impl Output for StubOutput {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn is_action_required_for_location(&self, location: &str, action: &Action) -> bool {
        self.locations.contains(location)
            && self
                .tags
                .as_ref()
                .map(|tags| tags.contains(action.tag()))
                .unwrap_or(true)
    }

    async fn execute(&self, _location: &str, _action: &Action) -> Result<(), OutputError> {
        Ok(())
    }
}

fn resolver_with(document: &str, outputs: Vec<Arc<dyn Output>>, locations: &[&str]) -> Resolver {
    let document: ScheduleDocument = serde_yaml::from_str(document).unwrap();
    let (executor, _templates) = Executor::new(
        outputs,
        locations.iter().map(|s| s.to_string()),
        TimerSettings::default(),
    );
    Resolver::new(document, executor)
}

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

// 2026-08-31 is a Monday.
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()
}

fn sunday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 30).unwrap()
}

const OVERRIDE_DOC: &str = r#"
day:
  every_day:
    locations: [bedroom]
    schedule:
      - time: "21:30"
        actions:
          - message: {text: "Bedtime."}
  weekday:
    when:
      days_of_week: [monday, tuesday, wednesday, thursday, friday]
    locations: [bedroom]
    schedule:
      - time: "06:30"
        actions:
          - message: {text: "Time to wake up."}
  holiday:
    replaces: [weekday]
    when:
      dates: ["2026-08-31"]
    locations: [bedroom]
    schedule:
      - time: "08:30"
        actions:
          - message: {text: "Sleep in."}
  disabled_day:
    disabled: true
    locations: [bedroom]
    schedule:
      - time: "05:00"
        actions:
          - message: {text: "Never."}
"#;

#[tokio::test]
async fn test_day_selection_honours_when_and_disabled() {
    let resolver = resolver_with(OVERRIDE_DOC, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    // Sunday: no weekday, no holiday date.
    let days = resolver.get_days_for_date(sunday()).unwrap();
    assert_eq!(days, vec!["every_day".to_string()]);
}

#[tokio::test]
async fn test_replaced_day_is_suppressed() {
    let resolver = resolver_with(OVERRIDE_DOC, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    // Monday 2026-08-31: weekday and holiday both match; holiday wins.
    let days = resolver.get_days_for_date(monday()).unwrap();
    assert_eq!(days, vec!["every_day".to_string(), "holiday".to_string()]);

    let schedule = resolver.get_schedule_for_date(monday()).unwrap();
    let times: Vec<NaiveTime> = schedule.iter().map(|entry| entry.time).collect();
    assert_eq!(times, vec![at(8, 30), at(21, 30)]);
}

#[tokio::test]
async fn test_replace_chains_resolve() {
    let doc = r#"
day:
  a:
    locations: [bedroom]
    schedule: [{time: "01:00", actions: [{message: {text: "a"}}]}]
  b:
    replaces: [a]
    locations: [bedroom]
    schedule: [{time: "02:00", actions: [{message: {text: "b"}}]}]
  c:
    replaces: [b]
    locations: [bedroom]
    schedule: [{time: "03:00", actions: [{message: {text: "c"}}]}]
"#;
    let resolver = resolver_with(doc, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    // c replaces b; with b gone, nothing suppresses c; a is still replaced
    // by b? No: b itself was removed, but b's replaces were processed only
    // if b survived. c is the only leaf, so b goes; then a is a leaf and
    // stays.
    let days = resolver.get_days_for_date(monday()).unwrap();
    assert_eq!(days, vec!["a".to_string(), "c".to_string()]);
}

#[tokio::test]
async fn test_circular_replaces_is_fatal() {
    let doc = r#"
day:
  a:
    replaces: [b]
    locations: [bedroom]
  b:
    replaces: [a]
    locations: [bedroom]
"#;
    let resolver = resolver_with(doc, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    let error = resolver.get_days_for_date(monday()).unwrap_err();
    assert!(matches!(error, ScheduleError::CircularReplaces { .. }));
}

#[tokio::test]
async fn test_entries_without_interested_outputs_are_absent() {
    let doc = r#"
day:
  every_day:
    locations: [bedroom, garage]
    schedule:
      - time: "07:00"
        actions:
          - message: {text: "Audible."}
      - time: "08:00"
        locations: [garage]
        actions:
          - message: {text: "Nobody listens here."}
"#;
    // Output only covers the bedroom.
    let resolver = resolver_with(doc, vec![StubOutput::new(&["bedroom"], None)], &["bedroom", "garage"]);

    let schedule = resolver.get_schedule_for_date(monday()).unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].time, at(7, 0));
    assert_eq!(schedule[0].locations, HashSet::from(["bedroom".to_string()]));
    assert!(!schedule.iter().any(|entry| entry.locations.is_empty()));
}

#[tokio::test]
async fn test_locations_exclude_is_subtracted() {
    let doc = r#"
day:
  every_day:
    locations: [bedroom, kitchen]
    schedule:
      - time: "07:00"
        locations_exclude: [bedroom]
        actions:
          - message: {text: "Kitchen only."}
"#;
    let resolver = resolver_with(
        doc,
        vec![StubOutput::new(&["bedroom", "kitchen"], None)],
        &["bedroom", "kitchen"],
    );

    let schedule = resolver.get_schedule_for_date(monday()).unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].locations, HashSet::from(["kitchen".to_string()]));
}

const TEMPLATE_DOC: &str = r#"
day:
  every_day:
    locations: [bedroom]
    schedule:
      - time: "21:00"
        actions:
          - message: {text: "Quiet time."}
      - time: "21:30"
        template: bedtime
template:
  bedtime:
    schedule:
      - time: "00:00"
        actions:
          - music: {play_list: quiet}
      - time: "00:15"
        actions:
          - lights: {action: turn_off}
"#;

#[tokio::test]
async fn test_template_offsets_are_added_to_anchor() {
    let resolver =
        resolver_with(TEMPLATE_DOC, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    let schedule = resolver.get_schedule_for_date(monday()).unwrap();
    let times: Vec<NaiveTime> = schedule.iter().map(|entry| entry.time).collect();
    assert_eq!(times, vec![at(21, 0), at(21, 30), at(21, 45)]);
    assert_eq!(schedule[1].actions[0].tag(), "music");
    assert_eq!(schedule[2].actions[0].tag(), "lights");
}

#[tokio::test]
async fn test_template_entry_past_midnight_is_dropped() {
    let doc = r#"
day:
  every_day:
    locations: [bedroom]
    schedule:
      - time: "23:50"
        template: bedtime
template:
  bedtime:
    schedule:
      - time: "00:05"
        actions:
          - music: {play_list: quiet}
      - time: "00:30"
        actions:
          - lights: {action: turn_off}
"#;
    let resolver = resolver_with(doc, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    // 23:50 + 00:30 lands tomorrow and is dropped; the rest still expands.
    let schedule = resolver.get_schedule_for_date(monday()).unwrap();
    let times: Vec<NaiveTime> = schedule.iter().map(|entry| entry.time).collect();
    assert_eq!(times, vec![at(23, 55)]);
}

#[tokio::test]
async fn test_timer_marker_emits_start_entry() {
    let doc = r#"
day:
  every_day:
    locations: [bedroom]
    schedule:
      - time: "07:10"
        actions:
          - message: {text: "Eat breakfast."}
      - time: "07:25"
        actions:
          - message: {text: "Teeth."}
        timer: {name: breakfast}
"#;
    let resolver = resolver_with(doc, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    let schedule = resolver.get_schedule_for_date(monday()).unwrap();
    let times: Vec<NaiveTime> = schedule.iter().map(|entry| entry.time).collect();
    assert_eq!(times, vec![at(7, 10), at(7, 10), at(7, 25)]);

    // The synthetic start entry carries the timer request ending at the
    // marked entry's time, replacing any stale timer of that name.
    let timer_entry = &schedule[1];
    let Action::Timer(request) = &timer_entry.actions[0] else {
        panic!("expected timer action, got {:?}", timer_entry.actions[0]);
    };
    assert_eq!(request.name, "breakfast");
    assert_eq!(request.end_time, Some(at(7, 25)));
    assert!(request.replace);
    assert_eq!(request.minutes, None);
}

#[tokio::test]
async fn test_timer_marker_without_anchor_is_fatal() {
    let doc = r#"
day:
  every_day:
    locations: [bedroom]
    schedule:
      - time: "07:25"
        actions:
          - message: {text: "Teeth."}
        timer:
"#;
    let resolver = resolver_with(doc, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    let error = resolver.get_schedule_for_date(monday()).unwrap_err();
    assert!(matches!(error, ScheduleError::TimerMarkerWithoutAnchor { .. }));
}

#[tokio::test]
async fn test_unknown_template_is_surfaced() {
    let resolver =
        resolver_with(TEMPLATE_DOC, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    let error = resolver
        .expand_template_at(
            monday(),
            at(12, 0),
            &HashSet::from(["bedroom".to_string()]),
            "no_such_template",
        )
        .unwrap_err();
    assert_eq!(
        error,
        ScheduleError::UnknownTemplate { name: "no_such_template".to_string() }
    );
}

#[tokio::test]
async fn test_self_referencing_template_is_fatal() {
    let doc = r#"
day:
  every_day:
    locations: [bedroom]
    schedule:
      - time: "12:00"
        template: forever
template:
  forever:
    schedule:
      - time: "00:01"
        template: forever
"#;
    let resolver = resolver_with(doc, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    let error = resolver.get_schedule_for_date(monday()).unwrap_err();
    assert!(matches!(error, ScheduleError::TemplateTooDeep { .. }));
}

#[tokio::test]
async fn test_resolved_entry_json_shape() {
    let resolver =
        resolver_with(OVERRIDE_DOC, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    let schedule = resolver.get_schedule_for_date(sunday()).unwrap();
    let json = serde_json::to_value(&schedule).unwrap();

    assert_eq!(json[0]["time"], "21:30");
    assert_eq!(json[0]["locations"], serde_json::json!(["bedroom"]));
    assert_eq!(
        json[0]["actions"],
        serde_json::json!([{"message": {"text": "Bedtime."}}])
    );
}

#[tokio::test]
async fn test_hot_reload_swaps_snapshot() {
    let resolver =
        resolver_with(OVERRIDE_DOC, vec![StubOutput::new(&["bedroom"], None)], &["bedroom"]);

    let replacement = r#"
day:
  every_day:
    locations: [bedroom]
    schedule:
      - time: "22:00"
        actions:
          - message: {text: "Later bedtime."}
"#;
    resolver.set_document(serde_yaml::from_str(replacement).unwrap());

    let schedule = resolver.get_schedule_for_date(sunday()).unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].time, at(22, 0));
}

#[tokio::test]
async fn test_scheduling_actions_survive_without_device_outputs() {
    // An output interested only in messages: the timer action still
    // propagates because scheduling actions bypass output capability.
    let doc = r#"
day:
  every_day:
    locations: [bedroom]
    schedule:
      - time: "16:00"
        actions:
          - timer: {name: tea, minutes: 10}
          - sound: {name: gong}
"#;
    let resolver = resolver_with(
        doc,
        vec![StubOutput::new(&["bedroom"], Some(&["message"]))],
        &["bedroom"],
    );

    let schedule = resolver.get_schedule_for_date(monday()).unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].actions.len(), 1);
    assert_eq!(schedule[0].actions[0].tag(), "timer");
}
