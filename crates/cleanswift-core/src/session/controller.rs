//! Session controller.
//!
//! Owns at most one live focus session: the task's lifecycle, its clock, the
//! optional checklist and the advisory chat transcript. All of it sits behind
//! one mutex. The two background jobs a session may have (the one-second
//! ticker and the checklist fetch) only hold a weak reference to that state
//! and check the session id before writing, so nothing they produce can leak
//! into a session that has been exited or replaced.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ai::{ChatAssistant, ChatMessage, VisionAnalyzer};
use crate::checklist::{ChecklistOutcome, ChecklistState};
use crate::error::SessionError;
use crate::events::Event;
use crate::points::PointsAward;
use crate::profile::Profile;
use crate::storage::{SessionConfig, Store};
use crate::task::gate::{CompletionGate, GateStatus, SessionEvidence};
use crate::task::{LifecycleAction, Task, TaskLifecycle, TaskStatus};
use crate::timer::{MonotonicTime, SessionClock, TimeSource, DEFAULT_ESTIMATE_MINUTES};

const EVENT_CAPACITY: usize = 256;

/// Tunables for sessions opened by a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub gate: CompletionGate,
    pub default_estimate_minutes: u32,
    pub tick_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            gate: CompletionGate::default(),
            default_estimate_minutes: DEFAULT_ESTIMATE_MINUTES,
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            gate: config.gate(),
            default_estimate_minutes: config.default_estimate_minutes.max(1),
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
        }
    }
}

/// Serializable view of the live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub task: Task,
    pub elapsed_secs: u64,
    /// `MM:SS`
    pub elapsed_display: String,
    pub running: bool,
    pub progress_percent: u8,
    pub checklist: ChecklistState,
    pub gate: GateStatus,
    pub transcript: Vec<ChatMessage>,
    /// The task is completed but its points have not been recorded yet.
    pub award_pending: bool,
}

impl SessionSnapshot {
    pub fn to_event(&self) -> Event {
        Event::StateSnapshot {
            task_id: self.task.id.clone(),
            status: self.task.status,
            elapsed_secs: self.elapsed_secs,
            running: self.running,
            progress_percent: self.progress_percent,
            checklist: self.checklist.clone(),
            gate: self.gate.clone(),
            at: Utc::now(),
        }
    }
}

/// Result of a successful `complete_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub task: Task,
    pub award: PointsAward,
    pub profile: Profile,
}

struct SessionState {
    id: String,
    lifecycle: TaskLifecycle,
    clock: SessionClock,
    checklist: ChecklistState,
    transcript: Vec<ChatMessage>,
    /// Set once the completed task is saved, cleared once points are recorded.
    pending_award: Option<PointsAward>,
    ticker: Option<JoinHandle<()>>,
    closed: bool,
}

impl SessionState {
    fn evidence(&self) -> SessionEvidence<'_> {
        SessionEvidence {
            elapsed_secs: self.clock.elapsed_secs(),
            checklist: self.checklist.available(),
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

type SharedState = Arc<Mutex<SessionState>>;

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn publish(events: &broadcast::Sender<Event>, event: Event) {
    // No subscribers is fine.
    let _ = events.send(event);
}

struct ActiveSession {
    id: String,
    state: SharedState,
    fetch: Option<JoinHandle<()>>,
}

impl ActiveSession {
    /// Stop everything the session runs. Returns the task id and elapsed time.
    fn shutdown(&self) -> (String, u64) {
        if let Some(fetch) = &self.fetch {
            fetch.abort();
        }
        let mut state = lock(&self.state);
        state.closed = true;
        state.clock.pause();
        state.stop_ticker();
        if state.pending_award.is_some() {
            tracing::warn!(
                session_id = %self.id,
                "session closed before its points were recorded"
            );
        }
        (state.lifecycle.task().id.clone(), state.clock.elapsed_secs())
    }
}

/// Drives one focus session at a time.
pub struct SessionController {
    store: Arc<dyn Store>,
    vision: Arc<dyn VisionAnalyzer>,
    chat: Arc<dyn ChatAssistant>,
    settings: SessionSettings,
    time: Arc<dyn TimeSource>,
    events: broadcast::Sender<Event>,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn Store>,
        vision: Arc<dyn VisionAnalyzer>,
        chat: Arc<dyn ChatAssistant>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            vision,
            chat,
            settings: SessionSettings::default(),
            time: Arc::new(MonotonicTime::new()),
            events,
            active: None,
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.id.as_str())
    }

    fn active(&self) -> Result<&ActiveSession, SessionError> {
        self.active.as_ref().ok_or(SessionError::NoActiveSession)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Open a focus session on `task_id`.
    ///
    /// A pending task is started first when `begin` is set; otherwise the task
    /// must already be in progress. A session that is still open is exited
    /// only once the new task has been accepted, so a failed open leaves it
    /// untouched. The clock starts at zero, paused. If the task carries an
    /// image the checklist is fetched in the background.
    pub async fn open_session(
        &mut self,
        task_id: &str,
        begin: bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut lifecycle = TaskLifecycle::new(self.store.load_task(task_id)?);
        if begin && lifecycle.status() == TaskStatus::Pending {
            lifecycle.start()?;
            let stored = self.store.save_task(lifecycle.task())?;
            lifecycle.sync_stored(stored);
            publish(
                &self.events,
                Event::TaskStarted {
                    task_id: task_id.to_string(),
                    at: Utc::now(),
                },
            );
        }
        if lifecycle.status() != TaskStatus::InProgress {
            return Err(SessionError::NotInProgress {
                task_id: task_id.to_string(),
                status: lifecycle.status(),
            });
        }

        self.end_session();

        let id = uuid::Uuid::new_v4().to_string();
        let image_ref = lifecycle.task().image_ref.clone();
        let state = Arc::new(Mutex::new(SessionState {
            id: id.clone(),
            lifecycle,
            clock: SessionClock::new(Arc::clone(&self.time)),
            checklist: if image_ref.is_some() {
                ChecklistState::Pending
            } else {
                ChecklistState::NotRequested
            },
            transcript: Vec::new(),
            pending_award: None,
            ticker: None,
            closed: false,
        }));

        tracing::info!(session_id = %id, task_id, "session opened");
        publish(
            &self.events,
            Event::SessionOpened {
                session_id: id.clone(),
                task_id: task_id.to_string(),
                at: Utc::now(),
            },
        );

        let fetch = image_ref.map(|image_ref| self.spawn_fetch(&id, &state, image_ref));
        self.active = Some(ActiveSession { id, state, fetch });

        let snapshot = self.snapshot()?;
        publish(&self.events, snapshot.to_event());
        Ok(snapshot)
    }

    /// Start or pause the clock. Returns whether it is now running.
    pub fn toggle_timer(&self) -> Result<bool, SessionError> {
        let active = self.active()?;
        let mut state = lock(&active.state);
        let event = state.clock.toggle();
        let running = state.clock.is_running();
        if running {
            if state.ticker.is_none() {
                state.ticker = self.spawn_ticker(&active.state);
            }
        } else {
            state.stop_ticker();
        }
        drop(state);

        if let Some(event) = event {
            publish(&self.events, event);
        }
        Ok(running)
    }

    /// Flip one checklist step. Returns its new completed flag.
    pub fn toggle_step(&self, index: usize) -> Result<bool, SessionError> {
        let active = self.active()?;
        let mut state = lock(&active.state);
        let checklist = match &mut state.checklist {
            ChecklistState::Ready { checklist } => checklist,
            ChecklistState::Unavailable { reason } => {
                return Err(SessionError::ChecklistUnavailable(reason.clone()));
            }
            ChecklistState::NotRequested | ChecklistState::Pending => {
                return Err(SessionError::InvalidStepIndex { index, len: None });
            }
        };
        let completed = checklist.toggle(index)?;
        let remaining = checklist.remaining();
        drop(state);

        tracing::debug!(index, completed, remaining, "step toggled");
        publish(
            &self.events,
            Event::StepToggled {
                index,
                completed,
                remaining,
                at: Utc::now(),
            },
        );
        Ok(completed)
    }

    /// Evaluate the completion gate without changing anything.
    pub fn gate(&self) -> Result<GateStatus, SessionError> {
        let active = self.active()?;
        let state = lock(&active.state);
        Ok(self.settings.gate.evaluate(&state.evidence()))
    }

    /// Complete the task, save it, then award points; in that order.
    ///
    /// The session lock is held throughout, so a concurrent step toggle lands
    /// entirely before or after. If saving fails nothing changes. If the
    /// points increment fails the task stays completed and the award is kept;
    /// calling this again retries only the increment. The session ends on
    /// success.
    pub fn complete_session(&mut self) -> Result<CompletionOutcome, SessionError> {
        let active = self.active()?;
        let mut state = lock(&active.state);

        let pending = state.pending_award;
        let award = match pending {
            Some(award) => award,
            None => {
                let mut next = state.lifecycle.clone();
                let actual_minutes =
                    next.complete(&self.settings.gate, &state.evidence(), Utc::now())?;
                let award = PointsAward::for_completion(actual_minutes, state.checklist.available());
                let stored = self.store.save_task(next.task())?;
                next.sync_stored(stored);

                state.lifecycle = next;
                state.clock.pause();
                state.stop_ticker();
                state.pending_award = Some(award);

                let task = state.lifecycle.task();
                tracing::info!(task_id = %task.id, actual_minutes, "task completed");
                publish(
                    &self.events,
                    Event::TaskCompleted {
                        task_id: task.id.clone(),
                        actual_minutes,
                        at: Utc::now(),
                    },
                );
                award
            }
        };

        let owner_id = state.lifecycle.task().owner_id.clone();
        let profile = self
            .store
            .increment_profile_points(&owner_id, award.total)?;
        state.pending_award = None;
        let task = state.lifecycle.task().clone();
        drop(state);

        tracing::info!(
            owner_id = %owner_id,
            points = award.total,
            total = profile.points,
            "points awarded"
        );
        publish(
            &self.events,
            Event::PointsAwarded {
                owner_id: owner_id.clone(),
                award,
                total_points: profile.points,
                level: profile.level(),
                at: Utc::now(),
            },
        );
        self.end_session();

        Ok(CompletionOutcome {
            task,
            award,
            profile,
        })
    }

    /// Close the session without touching the task's status.
    pub fn exit_session(&mut self) -> Result<(), SessionError> {
        if self.active.is_none() {
            return Err(SessionError::NoActiveSession);
        }
        self.end_session();
        Ok(())
    }

    fn end_session(&mut self) {
        if let Some(active) = self.active.take() {
            let (task_id, elapsed_secs) = active.shutdown();
            tracing::info!(session_id = %active.id, %task_id, elapsed_secs, "session closed");
            publish(
                &self.events,
                Event::SessionExited {
                    session_id: active.id,
                    task_id,
                    elapsed_secs,
                    at: Utc::now(),
                },
            );
        }
    }

    /// Ask the advisory chat a question about the current room.
    ///
    /// The session lock is not held while waiting for the reply. The question
    /// and its reply are appended together, and only if the same session is
    /// still open; a failed call leaves the transcript unchanged.
    pub async fn ask(&self, question: &str) -> Result<String, SessionError> {
        let asked = ChatMessage::user(question.trim());
        let (session_id, shared, mut transcript) = {
            let active = self.active()?;
            let state = lock(&active.state);
            (
                active.id.clone(),
                Arc::clone(&active.state),
                state.transcript.clone(),
            )
        };
        transcript.push(asked.clone());

        let reply = self.chat.follow_up(&transcript).await?;

        let mut state = lock(&shared);
        if state.closed || state.id != session_id {
            tracing::warn!(%session_id, "dropping chat reply for a closed session");
        } else {
            state.transcript.push(asked);
            state.transcript.push(ChatMessage::assistant(reply.clone()));
        }
        Ok(reply)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let active = self.active()?;
        let state = lock(&active.state);
        let task = state.lifecycle.task().clone();
        let estimate = task
            .estimated_minutes
            .unwrap_or(self.settings.default_estimate_minutes);
        Ok(SessionSnapshot {
            session_id: state.id.clone(),
            elapsed_secs: state.clock.elapsed_secs(),
            elapsed_display: state.clock.display(),
            running: state.clock.is_running(),
            progress_percent: state.clock.progress_percent(Some(estimate)),
            checklist: state.checklist.clone(),
            gate: self.settings.gate.evaluate(&state.evidence()),
            transcript: state.transcript.clone(),
            award_pending: state.pending_award.is_some(),
            task,
        })
    }

    /// Lifecycle actions allowed right now, with the gate applied.
    pub fn available_actions(&self) -> Result<Vec<LifecycleAction>, SessionError> {
        let active = self.active()?;
        let state = lock(&active.state);
        let gate_open = self.settings.gate.evaluate(&state.evidence()).is_open();
        Ok(state
            .lifecycle
            .available_actions()
            .into_iter()
            .filter(|action| *action != LifecycleAction::Complete || gate_open)
            .collect())
    }

    // ── Background jobs ──────────────────────────────────────────────

    fn spawn_fetch(&self, session_id: &str, state: &SharedState, image_ref: String) -> JoinHandle<()> {
        let vision = Arc::clone(&self.vision);
        let events = self.events.clone();
        let weak = Arc::downgrade(state);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            let outcome = ChecklistOutcome::from(vision.analyze(&image_ref).await);
            deliver_checklist(&weak, &session_id, outcome, &events);
        })
    }

    /// Periodic tick source. Without a runtime the clock still accumulates;
    /// only the tick events are missing.
    fn spawn_ticker(&self, state: &SharedState) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let weak = Arc::downgrade(state);
        let events = self.events.clone();
        let period = self.settings.tick_interval;
        Some(handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let event = {
                    let mut state = lock(&shared);
                    if state.closed || !state.clock.is_running() {
                        break;
                    }
                    state.clock.tick()
                };
                if let Some(event) = event {
                    publish(&events, event);
                }
            }
        }))
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.shutdown();
        }
    }
}

/// Apply a finished checklist fetch, unless its session is gone.
fn deliver_checklist(
    weak: &Weak<Mutex<SessionState>>,
    session_id: &str,
    outcome: ChecklistOutcome,
    events: &broadcast::Sender<Event>,
) {
    let Some(shared) = weak.upgrade() else {
        tracing::warn!(session_id, "discarding checklist for a session that no longer exists");
        return;
    };
    let mut state = lock(&shared);
    if state.closed || state.id != session_id {
        tracing::warn!(session_id, "discarding checklist for a closed session");
        return;
    }

    let event = match outcome {
        ChecklistOutcome::Available(checklist) => {
            let step_count = checklist.len();
            state
                .transcript
                .insert(0, ChatMessage::analysis_context(&checklist));
            state.checklist = ChecklistState::Ready { checklist };
            tracing::info!(session_id, step_count, "checklist ready");
            Event::ChecklistReady {
                session_id: session_id.to_string(),
                step_count,
                at: Utc::now(),
            }
        }
        ChecklistOutcome::Unavailable(reason) => {
            tracing::warn!(session_id, %reason, "checklist unavailable");
            state.checklist = ChecklistState::Unavailable {
                reason: reason.clone(),
            };
            Event::ChecklistUnavailable {
                session_id: session_id.to_string(),
                reason,
                at: Utc::now(),
            }
        }
    };
    drop(state);
    publish(events, event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let config = SessionConfig {
            min_work_secs: 45,
            default_estimate_minutes: 0,
            tick_interval_ms: 250,
        };
        let settings = SessionSettings::from(&config);
        assert_eq!(settings.gate.min_work_secs(), 45);
        assert_eq!(settings.default_estimate_minutes, 1);
        assert_eq!(settings.tick_interval, Duration::from_millis(250));
    }

    fn state(id: &str) -> SharedState {
        let mut lifecycle = TaskLifecycle::new(Task::new("u-1", "Attic"));
        lifecycle.start().unwrap();
        Arc::new(Mutex::new(SessionState {
            id: id.to_string(),
            lifecycle,
            clock: SessionClock::new(Arc::new(crate::timer::ManualTime::new())),
            checklist: ChecklistState::Pending,
            transcript: Vec::new(),
            pending_award: None,
            ticker: None,
            closed: false,
        }))
    }

    fn ready_outcome() -> ChecklistOutcome {
        ChecklistOutcome::Available(crate::checklist::Checklist::new(
            "dusty",
            vec![crate::checklist::ChecklistStep::new("Dust shelves", 1)],
        ))
    }

    #[test]
    fn checklist_is_delivered_to_its_own_open_session() {
        let (events, mut rx) = broadcast::channel(8);
        let shared = state("s-1");
        deliver_checklist(&Arc::downgrade(&shared), "s-1", ready_outcome(), &events);

        let state = lock(&shared);
        assert_eq!(state.checklist.available().map(|c| c.len()), Some(1));
        assert_eq!(state.transcript.len(), 1);
        assert!(matches!(rx.try_recv(), Ok(Event::ChecklistReady { step_count: 1, .. })));
    }

    #[test]
    fn late_checklist_never_reaches_another_or_closed_session() {
        let (events, mut rx) = broadcast::channel(8);

        let other = state("s-2");
        deliver_checklist(&Arc::downgrade(&other), "s-1", ready_outcome(), &events);
        assert!(lock(&other).checklist.is_pending());

        let closed = state("s-1");
        lock(&closed).closed = true;
        deliver_checklist(&Arc::downgrade(&closed), "s-1", ready_outcome(), &events);
        assert!(lock(&closed).checklist.is_pending());

        let dropped = Arc::downgrade(&state("s-1"));
        deliver_checklist(&dropped, "s-1", ready_outcome(), &events);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn default_settings() {
        let settings = SessionSettings::default();
        assert_eq!(settings.gate.min_work_secs(), 10);
        assert_eq!(settings.default_estimate_minutes, 25);
        assert_eq!(settings.tick_interval, Duration::from_secs(1));
    }
}
