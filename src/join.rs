//! Room assignment: enter the waiting list and poll until a room is assigned.

use std::time::Duration;

use crate::api::RobinApi;
use crate::error::RobinError;

/// Delay between the first click on the guarded container and the button
/// becoming pressable.
pub const UNLOCK_DELAY: Duration = Duration::from_millis(300);

/// Poll failures in a row before logging escalates from warn to error.
const FAILURE_ESCALATION: u32 = 5;

/// Join the waiting list, then poll for an assignment.
///
/// Makes up to `retries` polls of the assignment endpoint, each preceded by
/// a sleep of `interval`. Resolves with the assigned room id, or fails with
/// [`RobinError::JoinTimeout`] once every poll has come back empty. Failed
/// polls are soft errors and count as misses.
pub async fn join_room<A: RobinApi>(
    api: &A,
    retries: u32,
    interval: Duration,
) -> Result<String, RobinError> {
    if let Err(e) = api.join_room().await {
        tracing::warn!(error = %e, "join_room request failed, polling for assignment anyway");
    }

    let mut consecutive_failures: u32 = 0;
    for attempt in 1..=retries {
        tokio::time::sleep(interval).await;

        match api.room_assignment().await {
            Ok(Some(room_id)) => {
                tracing::info!(room_id = %room_id, attempt, "room assigned");
                return Ok(room_id);
            }
            Ok(None) => {
                consecutive_failures = 0;
                tracing::debug!(attempt, retries, "no room assignment yet");
            }
            Err(e) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                if consecutive_failures >= FAILURE_ESCALATION {
                    tracing::error!(error = %e, attempt, consecutive_failures, "room assignment poll failed repeatedly");
                } else {
                    tracing::warn!(error = %e, attempt, "room assignment poll failed");
                }
            }
        }
    }

    tracing::warn!(retries, "ran out of time waiting for a room assignment");
    Err(RobinError::JoinTimeout { attempts: retries })
}

// ---------------------------------------------------------------------------
// JoinButton
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinButtonState {
    #[default]
    Locked,
    Unlocking,
    Unlocked,
    /// A join is in flight; the button is disabled.
    Pressed,
}

/// The guarded "join" button: one click to unlock, a second to join.
#[derive(Debug, Default)]
pub struct JoinButton {
    state: JoinButtonState,
}

impl JoinButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JoinButtonState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state != JoinButtonState::Pressed
    }

    /// Lift the guard. Only the first call from `Locked` has any effect.
    pub async fn unlock(&mut self) {
        if self.state != JoinButtonState::Locked {
            return;
        }
        self.state = JoinButtonState::Unlocking;
        tokio::time::sleep(UNLOCK_DELAY).await;
        self.state = JoinButtonState::Unlocked;
    }

    /// Press the button and run the join flow.
    ///
    /// Pressing while not unlocked is rejected. On failure the button returns
    /// to unpressed and enabled so the user can try again.
    pub async fn press<A: RobinApi>(
        &mut self,
        api: &A,
        retries: u32,
        interval: Duration,
    ) -> Result<String, RobinError> {
        if self.state != JoinButtonState::Unlocked {
            return Err(RobinError::IllegalState("join button is not unlocked"));
        }
        self.state = JoinButtonState::Pressed;
        let result = join_room(api, retries, interval).await;
        if result.is_err() {
            self.state = JoinButtonState::Unlocked;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use crate::validators::Attributes;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Assigns a room on the `assign_on`-th poll (never when 0).
    struct Waitlist {
        polls: AtomicU32,
        assign_on: u32,
        fail_polls: bool,
    }

    impl Waitlist {
        fn new(assign_on: u32) -> Self {
            Self {
                polls: AtomicU32::new(0),
                assign_on,
                fail_polls: false,
            }
        }
    }

    impl RobinApi for Waitlist {
        async fn post_action(
            &self,
            _room_id: &str,
            _action: &str,
            _body: &Attributes,
        ) -> Result<Value, RequestError> {
            Ok(Value::Null)
        }

        async fn join_room(&self) -> Result<(), RequestError> {
            Ok(())
        }

        async fn room_assignment(&self) -> Result<Option<String>, RequestError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_polls {
                return Err(RequestError::Http { status: 502, url: "u".into() });
            }
            Ok((n == self.assign_on).then(|| "room42".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_resolves_on_assignment() {
        let api = Waitlist::new(3);
        let start = tokio::time::Instant::now();
        let room = join_room(&api, 10, Duration::from_secs(1)).await.unwrap();
        assert_eq!(room, "room42");
        assert_eq!(api.polls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_times_out_after_retries() {
        let api = Waitlist::new(0);
        let start = tokio::time::Instant::now();
        let err = join_room(&api, 10, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RobinError::JoinTimeout { attempts: 10 }));
        assert_eq!(api.polls.load(Ordering::SeqCst), 10);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_millis(10100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_are_misses() {
        let mut api = Waitlist::new(1);
        api.fail_polls = true;
        let err = join_room(&api, 6, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, RobinError::JoinTimeout { attempts: 6 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_fails_immediately() {
        let api = Waitlist::new(1);
        assert!(join_room(&api, 0, Duration::from_secs(1)).await.is_err());
        assert_eq!(api.polls.load(Ordering::SeqCst), 0);
    }

    // -- JoinButton ----------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_press_while_locked_is_rejected() {
        let mut button = JoinButton::new();
        let err = button.press(&Waitlist::new(1), 1, Duration::from_secs(1)).await;
        assert!(matches!(err, Err(RobinError::IllegalState(_))));
        assert_eq!(button.state(), JoinButtonState::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_takes_delay() {
        let mut button = JoinButton::new();
        let start = tokio::time::Instant::now();
        button.unlock().await;
        assert_eq!(button.state(), JoinButtonState::Unlocked);
        assert!(start.elapsed() >= UNLOCK_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_success_stays_pressed() {
        let mut button = JoinButton::new();
        button.unlock().await;
        let room = button.press(&Waitlist::new(2), 5, Duration::from_secs(1)).await.unwrap();
        assert_eq!(room, "room42");
        assert_eq!(button.state(), JoinButtonState::Pressed);
        assert!(!button.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_failure_returns_to_unpressed() {
        let mut button = JoinButton::new();
        button.unlock().await;
        assert!(button.press(&Waitlist::new(0), 3, Duration::from_secs(1)).await.is_err());
        assert_eq!(button.state(), JoinButtonState::Unlocked);
        assert!(button.is_enabled());
    }
}
