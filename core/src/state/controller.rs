//! Per-session pause controller

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};

use super::transitions::PauseTransition;
use super::types::{
    HitlResponse, PauseEvent, PauseEventKind, PauseMode, PauseState, PauseTrigger, ResumeSignal,
    TransitionRecord,
};

type Observer = Arc<dyn Fn(&PauseEvent) + Send + Sync>;

/// Human-in-the-loop state machine for one session.
///
/// Every public transition returns `false` and leaves the state untouched
/// when the current mode does not accept it. Clones share the same state.
#[derive(Clone)]
pub struct PauseController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    session_id: String,
    state: Mutex<ControllerState>,
    signal: watch::Sender<ResumeSignal>,
    event_tx: broadcast::Sender<PauseEvent>,
    observers: Mutex<Vec<Observer>>,
}

#[derive(Default)]
struct ControllerState {
    current: PauseState,
    history: Vec<TransitionRecord>,
    response: Option<HitlResponse>,
    cancelled: bool,
}

impl PauseController {
    pub fn new(session_id: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(1000);
        Self::with_event_sender(session_id, event_tx)
    }

    /// Controller that publishes onto a shared event channel.
    pub fn with_event_sender(
        session_id: impl Into<String>,
        event_tx: broadcast::Sender<PauseEvent>,
    ) -> Self {
        let (signal, _) = watch::channel(ResumeSignal::Running);
        Self {
            inner: Arc::new(ControllerInner {
                session_id: session_id.into(),
                state: Mutex::new(ControllerState::default()),
                signal,
                event_tx,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn mode(&self) -> PauseMode {
        self.lock_state().current.mode
    }

    pub fn state(&self) -> PauseState {
        self.lock_state().current.clone()
    }

    /// True when tasks may be dispatched.
    pub fn is_running(&self) -> bool {
        let state = self.lock_state();
        !state.cancelled && state.current.mode.is_running()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock_state().cancelled
    }

    pub fn history(&self) -> Vec<TransitionRecord> {
        self.lock_state().history.clone()
    }

    /// Take the decision delivered by the last submit, if any.
    pub fn take_response(&self) -> Option<HitlResponse> {
        self.lock_state().response.take()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PauseEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Register a callback invoked after every transition.
    ///
    /// Callbacks run on the transitioning thread, outside the state lock and
    /// after the event is broadcast. A panicking callback is logged and
    /// skipped. Slow consumers belong on [`PauseController::subscribe`].
    pub fn on_event<F>(&self, observer: F)
    where
        F: Fn(&PauseEvent) + Send + Sync + 'static,
    {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(observer));
    }

    pub fn request_pause(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.transition(PauseTrigger::RequestPause, |state| {
            state.current.reason = Some(reason);
        })
    }

    pub fn request_input(&self, field: impl Into<String>, message: impl Into<String>) -> bool {
        let field = field.into();
        let message = message.into();
        self.transition(PauseTrigger::RequestInput, |state| {
            state.current.field = Some(field);
            state.current.message = Some(message);
        })
    }

    pub fn request_approval(&self, task_id: impl Into<String>, message: impl Into<String>) -> bool {
        let task_id = task_id.into();
        let message = message.into();
        self.transition(PauseTrigger::RequestApproval, |state| {
            state.current.task_id = Some(task_id);
            state.current.message = Some(message);
        })
    }

    pub fn enter_plan_edit(&self) -> bool {
        self.transition(PauseTrigger::EnterPlanEdit, |_| {})
    }

    pub fn resume(&self) -> bool {
        self.transition(PauseTrigger::Resume, |_| {})
    }

    /// Leave plan editing: saving resumes, discarding returns to `paused`.
    pub fn exit_plan_edit(&self, save: bool) -> bool {
        self.transition(PauseTrigger::ExitPlanEdit { save }, |_| {})
    }

    pub fn submit_input(&self, value: Value, comment: Option<String>) -> bool {
        self.transition(PauseTrigger::SubmitInput, |state| {
            state.response = Some(HitlResponse::Input { value, comment });
        })
    }

    /// Deliver an approval decision. `Input` responses are not decisions and are refused.
    pub fn submit_approval(&self, response: HitlResponse) -> bool {
        if matches!(response, HitlResponse::Input { .. }) {
            tracing::debug!(session_id = %self.session_id(), "input response offered as approval");
            return false;
        }
        self.transition(PauseTrigger::SubmitApproval, |state| {
            state.response = Some(response);
        })
    }

    /// Cancel the session. Waiters wake up and observe "not resumed".
    /// Returns `false` if it was already cancelled.
    pub fn cancel(&self) -> bool {
        let event = {
            let mut state = self.lock_state();
            if state.cancelled {
                return false;
            }
            state.cancelled = true;
            self.inner.signal.send_replace(ResumeSignal::Cancelled);
            let mode = state.current.mode;
            self.event(PauseEventKind::Cancelled, mode, mode, &state.current, None)
        };

        tracing::info!(session_id = %self.session_id(), "session cancelled");
        self.publish(event);
        true
    }

    /// Block until the controller is running again.
    ///
    /// Returns `true` on resumption, `false` on timeout or cancellation.
    /// Returns immediately when already running.
    pub async fn wait_for_resume(&self, timeout: Option<Duration>) -> bool {
        let mut rx = self.inner.signal.subscribe();
        let wait = async move {
            let resumed = match rx.wait_for(|signal| *signal != ResumeSignal::Blocked).await {
                Ok(signal) => *signal == ResumeSignal::Running,
                Err(_) => false,
            };
            resumed
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.unwrap_or(false),
            None => wait.await,
        }
    }

    fn transition<F>(&self, trigger: PauseTrigger, update: F) -> bool
    where
        F: FnOnce(&mut ControllerState),
    {
        let event = {
            let mut state = self.lock_state();
            if state.cancelled {
                tracing::debug!(session_id = %self.session_id(), %trigger, "transition on cancelled session");
                return false;
            }

            let from = state.current.mode;
            let to = match PauseTransition::validate(from, trigger) {
                Ok(to) => to,
                Err(e) => {
                    tracing::debug!(session_id = %self.session_id(), error = %e, "pause transition rejected");
                    return false;
                }
            };

            if from != to {
                state.current.clear_context();
            }
            state.current.mode = to;
            state.current.since = Utc::now();
            update(&mut state);

            let timestamp = state.current.since;
            state.history.push(TransitionRecord {
                from,
                to,
                trigger,
                timestamp,
            });

            // Signal under the state lock so it always matches the final mode.
            let signal = if to.is_running() {
                ResumeSignal::Running
            } else {
                ResumeSignal::Blocked
            };
            self.inner.signal.send_replace(signal);

            self.event(
                PauseEventKind::for_trigger(trigger),
                from,
                to,
                &state.current,
                state.response.as_ref(),
            )
        };

        tracing::debug!(
            session_id = %self.session_id(),
            from = %event.from,
            to = %event.to,
            %trigger,
            "pause transition"
        );
        self.publish(event);
        true
    }

    fn event(
        &self,
        kind: PauseEventKind,
        from: PauseMode,
        to: PauseMode,
        current: &PauseState,
        response: Option<&HitlResponse>,
    ) -> PauseEvent {
        let mut payload = json!({
            "reason": current.reason,
            "message": current.message,
            "field": current.field,
            "task_id": current.task_id,
        });
        if let (Some(response), Value::Object(map)) = (response, &mut payload) {
            map.insert(
                "response".to_string(),
                serde_json::to_value(response).unwrap_or(Value::Null),
            );
        }

        PauseEvent {
            session_id: self.inner.session_id.clone(),
            kind,
            from,
            to,
            payload,
            timestamp: current.since,
        }
    }

    fn publish(&self, event: PauseEvent) {
        let observers: Vec<Observer> = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let _ = self.inner.event_tx.send(event.clone());
        for observer in &observers {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(&event))).is_err() {
                tracing::warn!(
                    session_id = %self.session_id(),
                    kind = event.kind.as_str(),
                    "pause observer panicked"
                );
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for PauseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PauseController")
            .field("session_id", &self.inner.session_id)
            .field("mode", &self.mode())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn expected_signal(ctl: &PauseController) -> ResumeSignal {
        if ctl.is_cancelled() {
            ResumeSignal::Cancelled
        } else if ctl.mode().is_running() {
            ResumeSignal::Running
        } else {
            ResumeSignal::Blocked
        }
    }

    fn race(ctl: &PauseController, left: fn(&PauseController), right: fn(&PauseController)) {
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let handles: Vec<_> = [left, right]
            .into_iter()
            .map(|op| {
                let ctl = ctl.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    op(&ctl);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_signal_matches_mode_under_concurrent_pause_and_resume() {
        for i in 0..2_000 {
            let ctl = PauseController::new("s1");
            assert!(ctl.request_pause("seed"));
            race(
                &ctl,
                |c| {
                    c.resume();
                },
                |c| {
                    c.request_pause("again");
                },
            );

            assert_eq!(*ctl.inner.signal.borrow(), expected_signal(&ctl), "iteration {i}");
            if ctl.is_running() {
                assert!(
                    ctl.wait_for_resume(Some(Duration::from_millis(50))).await,
                    "iteration {i}: running but wait timed out"
                );
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_racing_pause_always_wakes_waiters() {
        for i in 0..2_000 {
            let ctl = PauseController::new("s1");
            race(
                &ctl,
                |c| {
                    c.request_pause("hold");
                },
                |c| {
                    c.cancel();
                },
            );

            assert_eq!(*ctl.inner.signal.borrow(), ResumeSignal::Cancelled, "iteration {i}");
            let woke = tokio::time::timeout(Duration::from_secs(1), ctl.wait_for_resume(None)).await;
            assert!(matches!(woke, Ok(false)), "iteration {i}: waiter did not wake after cancel");
        }
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let ctl = PauseController::new("s1");
        let mut rx = ctl.subscribe();
        let seen = Arc::new(AtomicUsize::new(0));

        ctl.on_event(|_| panic!("observer failure"));
        let counter = seen.clone();
        ctl.on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(ctl.request_pause("hold"));
        assert_eq!(ctl.mode(), PauseMode::Paused);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap().kind, PauseEventKind::Paused);
    }

    #[test]
    fn test_starts_running() {
        let ctl = PauseController::new("s1");
        assert_eq!(ctl.mode(), PauseMode::Running);
        assert!(ctl.is_running());
        assert!(ctl.history().is_empty());
    }

    #[test]
    fn test_illegal_transition_leaves_state_unchanged() {
        let ctl = PauseController::new("s1");
        assert!(!ctl.resume());
        assert!(!ctl.enter_plan_edit());
        assert!(!ctl.submit_approval(HitlResponse::Approved { comment: None }));
        assert_eq!(ctl.mode(), PauseMode::Running);
        assert!(ctl.history().is_empty());
    }

    #[test]
    fn test_pause_edit_discard_resume() {
        let ctl = PauseController::new("s1");
        assert!(ctl.request_pause("review"));
        assert_eq!(ctl.state().reason.as_deref(), Some("review"));
        assert!(ctl.enter_plan_edit());
        assert!(ctl.exit_plan_edit(false));
        assert_eq!(ctl.mode(), PauseMode::Paused);
        assert!(ctl.resume());

        let trail: Vec<(PauseMode, PauseMode)> =
            ctl.history().iter().map(|r| (r.from, r.to)).collect();
        assert_eq!(
            trail,
            vec![
                (PauseMode::Running, PauseMode::Paused),
                (PauseMode::Paused, PauseMode::PlanEdit),
                (PauseMode::PlanEdit, PauseMode::Paused),
                (PauseMode::Paused, PauseMode::Running),
            ]
        );
        assert_eq!(ctl.state().reason, None);
    }

    #[test]
    fn test_approval_wait_only_accepts_approval() {
        let ctl = PauseController::new("s1");
        assert!(ctl.request_approval("deploy", "ship it?"));
        assert!(!ctl.resume());
        assert!(!ctl.request_pause("again"));
        assert!(!ctl.submit_input(json!("x"), None));
        assert!(!ctl.submit_approval(HitlResponse::Input {
            value: json!("x"),
            comment: None
        }));
        assert_eq!(ctl.mode(), PauseMode::ApprovalWait);

        assert!(ctl.submit_approval(HitlResponse::Rejected {
            comment: Some("no".into())
        }));
        assert!(ctl.is_running());
        assert_eq!(
            ctl.take_response(),
            Some(HitlResponse::Rejected {
                comment: Some("no".into())
            })
        );
        assert_eq!(ctl.take_response(), None);
    }

    #[test]
    fn test_input_request_roundtrip() {
        let ctl = PauseController::new("s1");
        assert!(ctl.request_input("region", "which region?"));
        assert_eq!(ctl.state().field.as_deref(), Some("region"));
        assert!(ctl.submit_input(json!("eu-west-1"), None));
        assert!(matches!(
            ctl.take_response(),
            Some(HitlResponse::Input { value, .. }) if value == json!("eu-west-1")
        ));
    }

    #[test]
    fn test_observers_receive_events() {
        let ctl = PauseController::new("s1");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        ctl.on_event(move |event| {
            assert_eq!(event.session_id, "s1");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut rx = ctl.subscribe();

        assert!(ctl.request_pause("wait"));
        assert!(!ctl.request_pause("twice"));
        assert!(ctl.resume());

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        let first = rx.try_recv().unwrap();
        assert_eq!(first.kind, PauseEventKind::Paused);
        assert_eq!(first.payload["reason"], json!("wait"));
        assert_eq!(rx.try_recv().unwrap().kind, PauseEventKind::Resumed);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_running() {
        let ctl = PauseController::new("s1");
        assert!(ctl.wait_for_resume(Some(Duration::from_millis(10))).await);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let ctl = PauseController::new("s1");
        ctl.request_pause("hold");
        assert!(!ctl.wait_for_resume(Some(Duration::from_millis(20))).await);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_resume() {
        let ctl = PauseController::new("s1");
        ctl.request_pause("hold");

        let resumer = ctl.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            resumer.resume()
        });

        assert!(ctl.wait_for_resume(Some(Duration::from_secs(5))).await);
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiters_without_resuming() {
        let ctl = PauseController::new("s1");
        ctl.request_pause("hold");

        let canceller = ctl.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        assert!(!ctl.wait_for_resume(None).await);
        assert!(ctl.is_cancelled());
        assert!(!ctl.resume());
        assert!(!ctl.cancel());
    }
}
