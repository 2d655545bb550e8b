//! Integration tests for the dismissal gate.
//!
//! Covers the timer-driven transitions (snooze reactivation, result
//! display) and the scheduler-to-gate hand-off.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use quizalarm_core::error::AudioError;
use quizalarm_core::{
    Alarm, AlarmScheduler, AlarmTime, AnswerOutcome, AudioGateway, Difficulty, DismissalGate,
    Event, GateSettings, GateState, ManualClock, MemoryAlarmStore, MemoryProblemRepository,
    JsonProblemRepository, Problem, SnoozeOutcome, SoundConfig, Weekday,
};
use serde_json::json;

#[derive(Default)]
struct CountingAudio {
    plays: AtomicUsize,
    stops: AtomicUsize,
}

impl AudioGateway for CountingAudio {
    fn play(&self, _sound: &SoundConfig) -> Result<(), AudioError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn problem(id: &str) -> Problem {
    Problem::from_value(json!({
        "id": id,
        "type": "quiz",
        "category": "math",
        "title": id,
        "difficulty": "medium",
        "content": {
            "question": { "type": "text", "text": "2 + 2 = ?" },
            "options": [
                { "id": "a", "type": "text", "content": "3" },
                { "id": "b", "type": "text", "content": "4" },
                { "id": "c", "type": "text", "content": "5" }
            ],
            "correct_answers": ["b"]
        }
    }))
    .unwrap()
}

fn gate(audio: Arc<CountingAudio>, result_display: Duration) -> DismissalGate {
    let repo = MemoryProblemRepository::new()
        .with_set("math", vec![problem("p1"), problem("p2"), problem("p3")]);
    DismissalGate::spawn(
        audio,
        Arc::new(repo),
        GateSettings {
            result_display,
            ..GateSettings::default()
        },
    )
    .unwrap()
}

fn alarm(id: &str) -> Alarm {
    let mut alarm = Alarm::new(AlarmTime::new(7, 0).unwrap(), Weekday::ALL);
    alarm.id = id.into();
    alarm.problem_sets = vec!["math".into()];
    alarm.difficulty = Difficulty::Medium;
    alarm.snooze.duration = 1;
    alarm
}

fn wrong() -> Vec<String> {
    vec!["a".into()]
}

fn right() -> Vec<String> {
    vec!["b".into()]
}

#[test]
fn test_wrong_wrong_correct_dismisses() {
    let audio = Arc::new(CountingAudio::default());
    let gate = gate(audio.clone(), Duration::ZERO);
    assert!(gate.activate(alarm("a1")));

    assert_eq!(gate.submit_answer(wrong()), AnswerOutcome::Incorrect { remaining: 2 });
    assert_eq!(gate.submit_answer(wrong()), AnswerOutcome::Incorrect { remaining: 1 });
    assert_eq!(gate.submit_answer(right()), AnswerOutcome::Dismissed);

    assert_eq!(gate.state(), GateState::Idle);
    assert_eq!(audio.stops.load(Ordering::SeqCst), 1);
    assert!(gate.history().iter().any(|e| matches!(
        e,
        Event::AnswerAccepted { total_attempts: 3, .. }
    )));
}

#[test]
fn test_reentrant_activation_keeps_first_alarm() {
    let audio = Arc::new(CountingAudio::default());
    let gate = gate(audio.clone(), Duration::ZERO);
    assert!(gate.activate(alarm("first")));
    gate.submit_answer(wrong());

    assert!(!gate.activate(alarm("second")));

    let snapshot = gate.snapshot();
    assert_eq!(snapshot.alarm.unwrap().id, "first");
    assert_eq!(snapshot.stats.unwrap().total_attempts, 1);
    assert_eq!(audio.plays.load(Ordering::SeqCst), 1);
}

#[test]
fn test_snooze_resumes_same_session() {
    let audio = Arc::new(CountingAudio::default());
    let gate = gate(audio.clone(), Duration::ZERO);
    gate.activate(alarm("a1"));
    gate.submit_answer(wrong());
    let before = gate.snapshot().stats.unwrap();

    assert!(matches!(gate.snooze(), SnoozeOutcome::Snoozed { .. }));
    assert_eq!(gate.state(), GateState::Snoozed);
    assert!(!gate.activate(alarm("other")));
    assert_eq!(gate.submit_answer(right()), AnswerOutcome::NotActive);

    thread::sleep(Duration::from_millis(1500));

    let after = gate.snapshot();
    assert_eq!(after.state, GateState::Active);
    assert_eq!(after.snooze_count, 1);
    assert_eq!(after.stats.unwrap(), before);
    assert_eq!(audio.plays.load(Ordering::SeqCst), 2);
    assert_eq!(gate.submit_answer(right()), AnswerOutcome::Dismissed);
}

#[test]
fn test_stop_cancels_pending_snooze() {
    let audio = Arc::new(CountingAudio::default());
    let gate = gate(audio.clone(), Duration::ZERO);
    gate.activate(alarm("a1"));
    gate.snooze();
    gate.stop();

    thread::sleep(Duration::from_millis(1500));

    assert_eq!(gate.state(), GateState::Idle);
    assert_eq!(audio.plays.load(Ordering::SeqCst), 1);
    assert!(!gate
        .history()
        .iter()
        .any(|e| matches!(e, Event::SnoozeEnded { .. })));
}

#[test]
fn test_late_snooze_timer_does_not_touch_new_activation() {
    let audio = Arc::new(CountingAudio::default());
    let gate = gate(audio.clone(), Duration::ZERO);
    gate.activate(alarm("a1"));
    gate.snooze();
    gate.stop();
    gate.activate(alarm("a2"));

    thread::sleep(Duration::from_millis(1500));

    let snapshot = gate.snapshot();
    assert_eq!(snapshot.state, GateState::Active);
    assert_eq!(snapshot.alarm.unwrap().id, "a2");
    assert_eq!(snapshot.snooze_count, 0);
}

#[test]
fn test_late_advance_timer_is_noop_after_stop() {
    let gate = gate(Arc::new(CountingAudio::default()), Duration::from_millis(100));
    gate.activate(alarm("a1"));
    gate.submit_answer(wrong());
    gate.stop();
    gate.activate(alarm("a2"));

    thread::sleep(Duration::from_millis(300));

    let snapshot = gate.snapshot();
    assert!(snapshot.feedback.is_none());
    assert_eq!(snapshot.stats.unwrap().current_problem, 1);
    assert!(!gate
        .history()
        .iter()
        .any(|e| matches!(e, Event::ProblemAdvanced { alarm_id, .. } if alarm_id == "a2")));
}

#[test]
fn test_scheduler_trigger_activates_gate() {
    let audio = Arc::new(CountingAudio::default());
    let gate = gate(audio.clone(), Duration::ZERO);
    let handle = gate.handle();
    let store = Arc::new(MemoryAlarmStore::with_alarms([alarm("a1")]));
    let clock = Arc::new(ManualClock::new(
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap(),
    ));
    let scheduler = AlarmScheduler::new(store, move |alarm| {
        handle.activate(alarm.clone());
    })
    .with_clock(clock)
    .with_interval(Duration::from_millis(20));

    scheduler.start().unwrap();
    thread::sleep(Duration::from_millis(200));
    scheduler.stop();

    let snapshot = gate.snapshot();
    assert_eq!(snapshot.state, GateState::Active);
    let active = snapshot.alarm.unwrap();
    assert_eq!(active.id, "a1");
    assert!(active.last_triggered.is_some());
    assert_eq!(audio.plays.load(Ordering::SeqCst), 1);
}

#[test]
fn test_exhaustion_from_problem_files() {
    let dir = tempfile::tempdir().unwrap();
    let quiz_dir = dir.path().join("quiz");
    std::fs::create_dir_all(&quiz_dir).unwrap();
    let mut records: Vec<serde_json::Value> = ["p1", "p2"]
        .iter()
        .map(|id| serde_json::to_value(problem(id)).unwrap())
        .collect();
    // Invalid record: skipped on load, never shown.
    records.push(json!({ "id": "broken", "type": "quiz" }));
    std::fs::write(
        quiz_dir.join("math.json"),
        serde_json::to_string(&records).unwrap(),
    )
    .unwrap();

    let audio = Arc::new(CountingAudio::default());
    let gate = DismissalGate::spawn(
        audio.clone(),
        Arc::new(JsonProblemRepository::new(dir.path())),
        GateSettings {
            result_display: Duration::ZERO,
            ..GateSettings::default()
        },
    )
    .unwrap();

    gate.activate(alarm("a1"));
    assert_eq!(gate.snapshot().stats.unwrap().total_problems, 2);
    assert_eq!(gate.submit_answer(wrong()), AnswerOutcome::Incorrect { remaining: 1 });
    assert_eq!(gate.submit_answer(vec!["b".into(), "c".into()]), AnswerOutcome::Exhausted);

    assert_eq!(gate.state(), GateState::Idle);
    assert_eq!(audio.stops.load(Ordering::SeqCst), 1);
    assert!(gate.history().iter().any(|e| matches!(
        e,
        Event::SessionExhausted { total_attempts: 2, .. }
    )));
}
