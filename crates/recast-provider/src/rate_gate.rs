use std::collections::VecDeque;
use std::time::Duration;

use chrono::{Datelike, Local};
use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Re-check interval while the daily quota is exhausted. The per-minute
/// window computes an exact wake-up instead.
const DAY_POLL: Duration = Duration::from_secs(30);

/// Dual-quota admission control in front of the generative backend:
/// at most `rpm` acquisitions in any trailing 60-second window and at most
/// `qpd` since local midnight.
///
/// `acquire` has no timeout by design; a starved caller waits until capacity
/// frees up or the day rolls over. Callers wanting a deadline must wrap the
/// call themselves.
pub struct RateGate {
    rpm: usize,
    qpd: usize,
    state: Mutex<GateState>,
}

struct GateState {
    window: VecDeque<Instant>,
    daily_count: usize,
    day: u32,
}

impl RateGate {
    pub fn new(rpm: usize, qpd: usize) -> Self {
        Self {
            rpm,
            qpd,
            state: Mutex::new(GateState {
                window: VecDeque::new(),
                daily_count: 0,
                day: Local::now().ordinal(),
            }),
        }
    }

    /// Wait until both quotas admit one request, then reserve it atomically.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let today = Local::now().ordinal();
                if state.day != today {
                    state.daily_count = 0;
                    state.day = today;
                }

                let now = Instant::now();
                while let Some(oldest) = state.window.front() {
                    if now.duration_since(*oldest) >= WINDOW {
                        state.window.pop_front();
                    } else {
                        break;
                    }
                }

                if state.daily_count < self.qpd && state.window.len() < self.rpm {
                    state.window.push_back(now);
                    state.daily_count += 1;
                    return;
                }

                if state.window.len() >= self.rpm {
                    // Exact wake-up: when the oldest entry leaves the window.
                    state
                        .window
                        .front()
                        .map(|oldest| WINDOW.saturating_sub(now.duration_since(*oldest)))
                        .unwrap_or(DAY_POLL)
                } else {
                    tracing::warn!(
                        daily_count = state.daily_count,
                        qpd = self.qpd,
                        "daily quota exhausted, waiting for day rollover"
                    );
                    DAY_POLL
                }
            };
            tokio::time::sleep(wait.max(Duration::from_millis(10))).await;
        }
    }
}
