use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::reference::ReferenceArtifact;

/// Refresh cadence of the countdown display.
pub const COUNTDOWN_TICK: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CountdownState {
    Remaining { hours: i64, minutes: i64 },
    Expired,
}

impl CountdownState {
    /// Remaining minutes round up, so the display never reads "0h 0m" while time is left.
    pub fn at(artifact: &ReferenceArtifact, now: DateTime<Utc>) -> Self {
        let remaining = artifact.remaining(now);
        let seconds = remaining.num_seconds();
        if seconds <= 0 {
            return Self::Expired;
        }
        let minutes = (seconds + 59) / 60;
        Self::Remaining {
            hours: minutes / 60,
            minutes: minutes % 60,
        }
    }

    pub fn is_expired(self) -> bool {
        matches!(self, Self::Expired)
    }

    pub fn label(self) -> String {
        match self {
            CountdownState::Remaining { hours, minutes } => format!("{hours}h {minutes}m remaining"),
            CountdownState::Expired => "expired".to_string(),
        }
    }
}

/// Publishes the countdown on a watch channel, recomputing every [`COUNTDOWN_TICK`] from the
/// stored timestamp. The final sleep is shortened so the flip to `Expired` lands on the expiry
/// instant; the task ends once `Expired` is sent or every receiver is gone.
pub fn spawn_countdown<F>(
    artifact: ReferenceArtifact,
    clock: F,
) -> (watch::Receiver<CountdownState>, JoinHandle<()>)
where
    F: Fn() -> DateTime<Utc> + Send + 'static,
{
    let initial = CountdownState::at(&artifact, clock());
    let (sender, receiver) = watch::channel(initial);

    let handle = tokio::spawn(async move {
        let mut state = initial;
        while !state.is_expired() {
            let until_expiry = artifact
                .remaining(clock())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(until_expiry.min(COUNTDOWN_TICK)).await;

            state = CountdownState::at(&artifact, clock());
            if sender.send(state).is_err() {
                break;
            }
        }
    });

    (receiver, handle)
}
