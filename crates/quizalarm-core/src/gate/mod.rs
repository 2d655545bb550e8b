//! Dismissal gate - the state machine between a ringing alarm and silence.
//!
//! ## State Transitions
//!
//! ```text
//!           activate                 snooze
//!   Idle ─────────────► Active ─────────────► Snoozed
//!    ▲                  │  ▲                     │
//!    │  correct answer  │  └── snooze elapsed ───┘
//!    │  or exhausted    │
//!    └──────────────────┘
//!    ▲
//!    └──────────── stop (from any state) ─────────
//! ```
//!
//! The gate runs as an actor on its own thread. [`DismissalGate`] owns the
//! thread; [`GateHandle`] is the cloneable front door used by callers, the
//! scheduler callback and the gate's own timers.

mod actor;
mod state;

pub use state::{AnswerOutcome, Feedback, GateSettings, GateSnapshot, GateState, SnoozeOutcome};

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::warn;

use crate::alarm::Alarm;
use crate::audio::AudioGateway;
use crate::events::Event;
use crate::problem::ProblemRepository;
use actor::{GateActor, GateCommand};

/// Cloneable handle onto the gate actor.
///
/// Every method is answered by the actor in queue order. Once the gate has
/// shut down, commands are dropped and queries return their idle defaults.
#[derive(Clone)]
pub struct GateHandle {
    tx: Sender<GateCommand>,
}

impl GateHandle {
    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> GateCommand) -> Option<T> {
        let (reply, response) = mpsc::channel();
        if self.tx.send(build(reply)).is_err() {
            warn!("dismissal gate is shut down");
            return None;
        }
        response.recv().ok()
    }

    /// Start ringing `alarm` and open a quiz session for it.
    ///
    /// Returns false, changing nothing, if another activation is in progress.
    pub fn activate(&self, alarm: Alarm) -> bool {
        self.request(|reply| GateCommand::Activate { alarm, reply })
            .unwrap_or(false)
    }

    pub fn submit_answer(&self, selected: Vec<String>) -> AnswerOutcome {
        self.request(|reply| GateCommand::Submit { selected, reply })
            .unwrap_or(AnswerOutcome::NotActive)
    }

    /// Toggle an option of the current problem's selection (progress display).
    pub fn toggle_option(&self, option_id: &str) -> bool {
        let option_id = option_id.to_string();
        self.request(|reply| GateCommand::Toggle { option_id, reply })
            .unwrap_or(false)
    }

    pub fn snooze(&self) -> SnoozeOutcome {
        self.request(|reply| GateCommand::Snooze { reply })
            .unwrap_or(SnoozeOutcome::NotActive)
    }

    /// Force the gate to Idle, silencing audio and cancelling timers.
    pub fn stop(&self) {
        let _ = self.request(|reply| GateCommand::Stop { reply });
    }

    pub fn snapshot(&self) -> GateSnapshot {
        self.request(|reply| GateCommand::Snapshot { reply })
            .unwrap_or_default()
    }

    pub fn state(&self) -> GateState {
        self.snapshot().state
    }

    pub fn current_alarm(&self) -> Option<Alarm> {
        self.snapshot().alarm
    }

    pub fn is_active(&self) -> bool {
        self.state() == GateState::Active
    }

    /// Recorded transitions, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.request(|reply| GateCommand::History { reply })
            .unwrap_or_default()
    }

    /// Receive every event recorded from now on.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (events, receiver) = mpsc::channel();
        let _ = self.tx.send(GateCommand::Subscribe { events });
        receiver
    }
}

/// Owner of the gate actor thread. Dropping it stops the gate and joins
/// the thread.
pub struct DismissalGate {
    handle: GateHandle,
    worker: Option<JoinHandle<()>>,
}

impl DismissalGate {
    /// Spawn the gate actor.
    ///
    /// # Errors
    /// Returns an error if the actor thread cannot be spawned.
    pub fn spawn(
        audio: Arc<dyn AudioGateway>,
        repository: Arc<dyn ProblemRepository>,
        settings: GateSettings,
    ) -> crate::error::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let actor = GateActor::new(audio, repository, settings, tx.clone());
        let worker = thread::Builder::new()
            .name("quizalarm-gate".into())
            .spawn(move || actor.run(rx))?;
        Ok(Self {
            handle: GateHandle { tx },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> GateHandle {
        self.handle.clone()
    }

    /// Stop any activation and wait for the actor thread to exit.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.handle.tx.send(GateCommand::Shutdown);
            if worker.join().is_err() {
                warn!("dismissal gate thread panicked");
            }
        }
    }
}

impl std::ops::Deref for DismissalGate {
    type Target = GateHandle;

    fn deref(&self) -> &GateHandle {
        &self.handle
    }
}

impl Drop for DismissalGate {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmTime, Difficulty, Weekday};
    use crate::problem::MemoryProblemRepository;
    use crate::test_support::{quiz, RecordingAudio};
    use std::time::Duration;

    fn gate_with(audio: Arc<RecordingAudio>, display: Duration) -> DismissalGate {
        let repo = MemoryProblemRepository::new().with_set(
            "math",
            vec![
                quiz("p1", Difficulty::Easy, &["a"]),
                quiz("p2", Difficulty::Easy, &["a"]),
                quiz("p3", Difficulty::Easy, &["a"]),
            ],
        );
        DismissalGate::spawn(
            audio,
            Arc::new(repo),
            GateSettings {
                result_display: display,
                history_limit: 16,
            },
        )
        .unwrap()
    }

    fn alarm(id: &str) -> Alarm {
        let mut alarm = Alarm::new(AlarmTime::new(7, 0).unwrap(), [Weekday::Monday]);
        alarm.id = id.into();
        alarm.problem_sets = vec!["math".into()];
        alarm.difficulty = Difficulty::Easy;
        alarm
    }

    fn answer(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn starts_idle() {
        let gate = gate_with(Arc::new(RecordingAudio::default()), Duration::ZERO);
        assert_eq!(gate.state(), GateState::Idle);
        assert!(gate.current_alarm().is_none());
        assert_eq!(gate.submit_answer(answer(&["a"])), AnswerOutcome::NotActive);
        assert_eq!(gate.snooze(), SnoozeOutcome::NotActive);
    }

    #[test]
    fn second_activation_is_ignored() {
        let audio = Arc::new(RecordingAudio::default());
        let gate = gate_with(audio.clone(), Duration::ZERO);
        assert!(gate.activate(alarm("first")));
        assert!(!gate.activate(alarm("second")));

        assert_eq!(gate.current_alarm().unwrap().id, "first");
        assert_eq!(audio.plays(), 1);
        assert!(gate
            .history()
            .iter()
            .any(|e| matches!(e, Event::ActivationIgnored { alarm_id, .. } if alarm_id == "second")));
    }

    #[test]
    fn correct_answer_dismisses() {
        let audio = Arc::new(RecordingAudio::default());
        let gate = gate_with(audio.clone(), Duration::ZERO);
        gate.activate(alarm("a1"));
        assert_eq!(gate.submit_answer(answer(&["a"])), AnswerOutcome::Dismissed);
        assert_eq!(gate.state(), GateState::Idle);
        assert!(gate.current_alarm().is_none());
        assert_eq!(audio.stops(), 1);
    }

    #[test]
    fn wrong_answers_until_exhausted() {
        let audio = Arc::new(RecordingAudio::default());
        let gate = gate_with(audio.clone(), Duration::ZERO);
        gate.activate(alarm("a1"));
        assert_eq!(
            gate.submit_answer(answer(&["b"])),
            AnswerOutcome::Incorrect { remaining: 2 }
        );
        assert_eq!(
            gate.submit_answer(answer(&["b"])),
            AnswerOutcome::Incorrect { remaining: 1 }
        );
        assert_eq!(gate.submit_answer(answer(&["b"])), AnswerOutcome::Exhausted);
        assert_eq!(gate.state(), GateState::Idle);
        assert_eq!(audio.stops(), 1);
    }

    #[test]
    fn result_display_delays_next_problem() {
        let gate = gate_with(Arc::new(RecordingAudio::default()), Duration::from_millis(150));
        gate.activate(alarm("a1"));
        gate.submit_answer(answer(&["c"]));

        let shown = gate.snapshot();
        assert_eq!(shown.feedback, Some(Feedback::Incorrect));
        assert!(shown.problem.is_none());
        assert_eq!(
            gate.submit_answer(answer(&["a"])),
            AnswerOutcome::AwaitingNextProblem
        );
        // Other operations stay available during the delay.
        assert!(gate.is_active());

        std::thread::sleep(Duration::from_millis(400));
        let next = gate.snapshot();
        assert!(next.feedback.is_none());
        assert_eq!(next.stats.unwrap().current_problem, 2);
        assert_eq!(gate.submit_answer(answer(&["a"])), AnswerOutcome::Dismissed);
    }

    #[test]
    fn snooze_disabled_and_limit() {
        let gate = gate_with(Arc::new(RecordingAudio::default()), Duration::ZERO);
        let mut no_snooze = alarm("a1");
        no_snooze.snooze.enabled = false;
        gate.activate(no_snooze);
        assert_eq!(gate.snooze(), SnoozeOutcome::Disabled);
        gate.stop();

        let mut limited = alarm("a2");
        limited.snooze.max_count = 1;
        limited.snooze.duration = 3600;
        gate.activate(limited);
        assert!(matches!(gate.snooze(), SnoozeOutcome::Snoozed { .. }));
        assert_eq!(gate.state(), GateState::Snoozed);
        // Snoozed is not Active, so a second snooze is refused outright.
        assert_eq!(gate.snooze(), SnoozeOutcome::NotActive);
    }

    #[test]
    fn oversized_snooze_keeps_the_gate_alive() {
        let audio = Arc::new(RecordingAudio::default());
        let gate = gate_with(audio.clone(), Duration::ZERO);
        let mut a = alarm("a1");
        a.snooze.duration = 10_000_000_000_000;
        gate.activate(a);

        assert_eq!(gate.snooze(), SnoozeOutcome::Snoozed { until: None });
        assert_eq!(gate.state(), GateState::Snoozed);
        assert!(gate.snapshot().snoozed_until.is_none());

        gate.stop();
        assert!(gate.activate(alarm("next")));
        assert_eq!(gate.current_alarm().map(|a| a.id), Some("next".to_string()));
        assert_eq!(audio.plays(), 2);
    }

    #[test]
    fn stop_forces_idle_from_snoozed() {
        let audio = Arc::new(RecordingAudio::default());
        let gate = gate_with(audio.clone(), Duration::ZERO);
        let mut a = alarm("a1");
        a.snooze.duration = 3600;
        gate.activate(a);
        gate.snooze();
        gate.stop();
        assert_eq!(gate.state(), GateState::Idle);
        assert!(gate.current_alarm().is_none());
        assert!(gate
            .history()
            .iter()
            .any(|e| matches!(e, Event::GateStopped { alarm_id: Some(id), .. } if id == "a1")));
    }

    #[test]
    fn audio_failure_does_not_block_activation() {
        let audio = Arc::new(RecordingAudio::failing());
        let gate = gate_with(audio.clone(), Duration::ZERO);
        assert!(gate.activate(alarm("a1")));
        assert!(gate.is_active());
        assert_eq!(gate.submit_answer(answer(&["a"])), AnswerOutcome::Dismissed);
        assert!(gate
            .history()
            .iter()
            .any(|e| matches!(e, Event::AudioFailed { .. })));
    }

    #[test]
    fn empty_problem_sets_report_no_problems() {
        let gate = gate_with(Arc::new(RecordingAudio::default()), Duration::ZERO);
        let mut a = alarm("a1");
        a.problem_sets = vec!["unknown".into()];
        gate.activate(a);
        assert_eq!(gate.submit_answer(answer(&["a"])), AnswerOutcome::NoProblems);
        assert!(gate.is_active());
    }

    #[test]
    fn subscribers_receive_events() {
        let gate = gate_with(Arc::new(RecordingAudio::default()), Duration::ZERO);
        let events = gate.subscribe();
        gate.activate(alarm("a1"));
        let first = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(first, Event::GateActivated { problem_count: 3, .. }));
    }

    #[test]
    fn handle_after_shutdown_returns_defaults() {
        let mut gate = gate_with(Arc::new(RecordingAudio::default()), Duration::ZERO);
        let handle = gate.handle();
        gate.shutdown();
        assert!(!handle.activate(alarm("late")));
        assert_eq!(handle.state(), GateState::Idle);
    }
}
