//! The gate actor: a single thread owning all gate state.
//!
//! Callers, the scheduler callback and timer threads all talk to it through
//! one ordered command queue, so every transition is atomic with respect to
//! every other. Timer messages carry the generation they were armed in; any
//! transition bumps the generation, which turns late firings into no-ops.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::state::{AnswerOutcome, Feedback, GateSettings, GateSnapshot, GateState, SnoozeOutcome};
use crate::alarm::Alarm;
use crate::audio::AudioGateway;
use crate::events::Event;
use crate::problem::ProblemRepository;
use crate::quiz::QuizSession;

pub(super) enum GateCommand {
    Activate {
        alarm: Alarm,
        reply: Sender<bool>,
    },
    Submit {
        selected: Vec<String>,
        reply: Sender<AnswerOutcome>,
    },
    Toggle {
        option_id: String,
        reply: Sender<bool>,
    },
    Snooze {
        reply: Sender<SnoozeOutcome>,
    },
    Stop {
        reply: Sender<()>,
    },
    Snapshot {
        reply: Sender<GateSnapshot>,
    },
    History {
        reply: Sender<Vec<Event>>,
    },
    Subscribe {
        events: Sender<Event>,
    },
    SnoozeElapsed {
        generation: u64,
        alarm_id: String,
    },
    AdvanceElapsed {
        generation: u64,
    },
    Shutdown,
}

/// One-shot timer thread. Dropping it cancels a pending firing.
struct OneShot {
    _cancel: Sender<()>,
}

impl OneShot {
    fn arm(delay: Duration, tx: Sender<GateCommand>, command: GateCommand) -> Option<Self> {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let spawned = thread::Builder::new()
            .name("quizalarm-gate-timer".into())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(delay) {
                    let _ = tx.send(command);
                }
            });
        match spawned {
            Ok(_) => Some(Self { _cancel: cancel }),
            Err(e) => {
                warn!(error = %e, "failed to arm gate timer");
                None
            }
        }
    }
}

pub(super) struct GateActor {
    state: GateState,
    alarm: Option<Alarm>,
    session: Option<QuizSession>,
    feedback: Option<Feedback>,
    snooze_count: u32,
    snoozed_until: Option<chrono::DateTime<Utc>>,
    generation: u64,
    snooze_timer: Option<OneShot>,
    advance_timer: Option<OneShot>,
    audio: Arc<dyn AudioGateway>,
    repository: Arc<dyn ProblemRepository>,
    settings: GateSettings,
    history: VecDeque<Event>,
    subscribers: Vec<Sender<Event>>,
    tx: Sender<GateCommand>,
}

impl GateActor {
    pub(super) fn new(
        audio: Arc<dyn AudioGateway>,
        repository: Arc<dyn ProblemRepository>,
        settings: GateSettings,
        tx: Sender<GateCommand>,
    ) -> Self {
        Self {
            state: GateState::Idle,
            alarm: None,
            session: None,
            feedback: None,
            snooze_count: 0,
            snoozed_until: None,
            generation: 0,
            snooze_timer: None,
            advance_timer: None,
            audio,
            repository,
            settings,
            history: VecDeque::new(),
            subscribers: Vec::new(),
            tx,
        }
    }

    pub(super) fn run(mut self, commands: Receiver<GateCommand>) {
        debug!("dismissal gate started");
        while let Ok(command) = commands.recv() {
            match command {
                GateCommand::Activate { alarm, reply } => {
                    let _ = reply.send(self.activate(alarm));
                }
                GateCommand::Submit { selected, reply } => {
                    let _ = reply.send(self.submit(&selected));
                }
                GateCommand::Toggle { option_id, reply } => {
                    let toggled = match (self.state, self.session.as_mut()) {
                        (GateState::Active, Some(session)) => session.toggle_option(&option_id),
                        _ => false,
                    };
                    let _ = reply.send(toggled);
                }
                GateCommand::Snooze { reply } => {
                    let _ = reply.send(self.snooze());
                }
                GateCommand::Stop { reply } => {
                    self.stop();
                    let _ = reply.send(());
                }
                GateCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                GateCommand::History { reply } => {
                    let _ = reply.send(self.history.iter().cloned().collect());
                }
                GateCommand::Subscribe { events } => self.subscribers.push(events),
                GateCommand::SnoozeElapsed {
                    generation,
                    alarm_id,
                } => self.snooze_elapsed(generation, &alarm_id),
                GateCommand::AdvanceElapsed { generation } => self.advance_elapsed(generation),
                GateCommand::Shutdown => break,
            }
        }
        if self.state != GateState::Idle {
            self.stop();
        }
        debug!("dismissal gate exited");
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn activate(&mut self, alarm: Alarm) -> bool {
        if self.state != GateState::Idle {
            debug!(alarm_id = %alarm.id, state = ?self.state, "activation ignored: gate busy");
            self.record(Event::ActivationIgnored {
                alarm_id: alarm.id,
                state: self.state,
                at: Utc::now(),
            });
            return false;
        }

        self.generation += 1;
        self.state = GateState::Active;
        self.snooze_count = 0;
        self.feedback = None;
        self.start_audio(&alarm);

        let mut session = QuizSession::new(
            alarm.problem_sets.clone(),
            alarm.difficulty,
            Arc::clone(&self.repository),
        );
        session.start();
        let problem_count = session.problem_count();
        if problem_count == 0 {
            warn!(alarm_id = %alarm.id, sets = ?alarm.problem_sets, "no problems available for alarm");
        }
        info!(alarm_id = %alarm.id, label = %alarm.label, problem_count, "gate activated");

        self.record(Event::GateActivated {
            alarm_id: alarm.id.clone(),
            problem_count,
            at: Utc::now(),
        });
        self.session = Some(session);
        self.alarm = Some(alarm);
        true
    }

    fn submit(&mut self, selected: &[String]) -> AnswerOutcome {
        if self.state != GateState::Active {
            return AnswerOutcome::NotActive;
        }
        if self.feedback.is_some() {
            return AnswerOutcome::AwaitingNextProblem;
        }
        let alarm_id = self.alarm_id();
        let Some(session) = self.session.as_mut() else {
            return AnswerOutcome::NotActive;
        };
        if session.current_problem().is_none() {
            return AnswerOutcome::NoProblems;
        }

        let correct = session.submit(selected);
        let total_attempts = session.total_attempts();
        let remaining = session.problem_count().saturating_sub(session.index());
        let has_more = session.has_more();

        if correct {
            info!(alarm_id = %alarm_id, total_attempts, "correct answer, dismissing alarm");
            self.record(Event::AnswerAccepted {
                alarm_id,
                total_attempts,
                at: Utc::now(),
            });
            self.deactivate();
            AnswerOutcome::Dismissed
        } else if has_more {
            info!(alarm_id = %alarm_id, remaining, "incorrect answer");
            self.record(Event::AnswerRejected {
                alarm_id,
                remaining,
                at: Utc::now(),
            });
            self.show_result_then_advance();
            AnswerOutcome::Incorrect { remaining }
        } else {
            info!(alarm_id = %alarm_id, total_attempts, "problems exhausted without a correct answer");
            self.record(Event::SessionExhausted {
                alarm_id,
                total_attempts,
                at: Utc::now(),
            });
            self.deactivate();
            AnswerOutcome::Exhausted
        }
    }

    fn show_result_then_advance(&mut self) {
        if self.settings.result_display.is_zero() {
            self.clear_result();
            return;
        }
        self.feedback = Some(Feedback::Incorrect);
        self.advance_timer = OneShot::arm(
            self.settings.result_display,
            self.tx.clone(),
            GateCommand::AdvanceElapsed {
                generation: self.generation,
            },
        );
        if self.advance_timer.is_none() {
            self.clear_result();
        }
    }

    fn advance_elapsed(&mut self, generation: u64) {
        if generation != self.generation
            || self.state != GateState::Active
            || self.feedback.is_none()
        {
            debug!(generation, current = self.generation, "stale advance timer ignored");
            return;
        }
        self.advance_timer = None;
        self.clear_result();
    }

    fn clear_result(&mut self) {
        self.feedback = None;
        let problem_index = self.session.as_ref().map(|s| s.index()).unwrap_or(0);
        self.record(Event::ProblemAdvanced {
            alarm_id: self.alarm_id(),
            problem_index,
            at: Utc::now(),
        });
    }

    fn snooze(&mut self) -> SnoozeOutcome {
        let Some(alarm) = self.alarm.as_ref().filter(|_| self.state == GateState::Active) else {
            return SnoozeOutcome::NotActive;
        };
        if !alarm.snooze.enabled {
            return SnoozeOutcome::Disabled;
        }
        if alarm.snooze.max_count > 0 && self.snooze_count >= alarm.snooze.max_count {
            info!(alarm_id = %alarm.id, max = alarm.snooze.max_count, "snooze limit reached");
            return SnoozeOutcome::LimitReached;
        }

        let alarm_id = alarm.id.clone();
        let duration = Duration::from_secs(alarm.snooze.duration);
        self.snooze_for(alarm_id, duration)
    }

    fn snooze_for(&mut self, alarm_id: String, duration: Duration) -> SnoozeOutcome {
        self.generation += 1;
        self.state = GateState::Snoozed;
        self.snooze_count += 1;
        self.feedback = None;
        self.advance_timer = None;
        self.stop_audio();

        // Out-of-range durations leave the deadline unknown; the timer still runs.
        let until = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        self.snoozed_until = until;
        self.snooze_timer = OneShot::arm(
            duration,
            self.tx.clone(),
            GateCommand::SnoozeElapsed {
                generation: self.generation,
                alarm_id: alarm_id.clone(),
            },
        );

        info!(alarm_id = %alarm_id, secs = duration.as_secs(), count = self.snooze_count, "alarm snoozed");
        self.record(Event::Snoozed {
            alarm_id,
            snooze_count: self.snooze_count,
            until,
            at: Utc::now(),
        });
        SnoozeOutcome::Snoozed { until }
    }

    fn snooze_elapsed(&mut self, generation: u64, alarm_id: &str) {
        let same_alarm = self.alarm.as_ref().is_some_and(|a| a.id == alarm_id);
        if self.state != GateState::Snoozed || generation != self.generation || !same_alarm {
            debug!(alarm_id, generation, current = self.generation, "stale snooze timer ignored");
            return;
        }

        self.generation += 1;
        self.state = GateState::Active;
        self.snooze_timer = None;
        self.snoozed_until = None;
        if let Some(alarm) = self.alarm.clone() {
            self.start_audio(&alarm);
        }
        info!(alarm_id, "snooze over, alarm reactivated");
        self.record(Event::SnoozeEnded {
            alarm_id: alarm_id.to_string(),
            at: Utc::now(),
        });
    }

    fn stop(&mut self) {
        let alarm_id = self.alarm.as_ref().map(|a| a.id.clone());
        self.deactivate();
        info!(alarm_id = alarm_id.as_deref().unwrap_or("-"), "gate stopped");
        self.record(Event::GateStopped {
            alarm_id,
            at: Utc::now(),
        });
    }

    /// Any state to Idle: silence, drop the session, cancel timers.
    fn deactivate(&mut self) {
        self.generation += 1;
        self.snooze_timer = None;
        self.advance_timer = None;
        self.stop_audio();
        self.state = GateState::Idle;
        self.alarm = None;
        self.session = None;
        self.feedback = None;
        self.snooze_count = 0;
        self.snoozed_until = None;
    }

    // ── Audio ────────────────────────────────────────────────────────

    fn start_audio(&mut self, alarm: &Alarm) {
        if let Err(e) = self.audio.play(&alarm.sound) {
            warn!(alarm_id = %alarm.id, error = %e, "audio start failed");
            self.record(Event::AudioFailed {
                alarm_id: alarm.id.clone(),
                message: e.to_string(),
                at: Utc::now(),
            });
        }
    }

    fn stop_audio(&mut self) {
        if let Err(e) = self.audio.stop() {
            warn!(error = %e, "audio stop failed");
            self.record(Event::AudioFailed {
                alarm_id: self.alarm_id(),
                message: e.to_string(),
                at: Utc::now(),
            });
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    fn alarm_id(&self) -> String {
        self.alarm.as_ref().map(|a| a.id.clone()).unwrap_or_default()
    }

    fn snapshot(&self) -> GateSnapshot {
        let session = self.session.as_ref();
        GateSnapshot {
            state: self.state,
            alarm: self.alarm.clone(),
            problem: session
                .filter(|_| self.feedback.is_none())
                .and_then(|s| s.current_problem().cloned()),
            feedback: self.feedback,
            stats: session.map(|s| s.stats()),
            progress: session.map(|s| s.progress()).unwrap_or(0.0),
            snooze_count: self.snooze_count,
            snoozed_until: self.snoozed_until,
        }
    }

    fn record(&mut self, event: Event) {
        self.subscribers.retain(|s| s.send(event.clone()).is_ok());
        if self.history.len() >= self.settings.history_limit.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }
}
