// poller.rs - Bounded Job Poller
// Drives a remote job from Pending to a terminal status.
//
// Key Features:
// - Fixed or multiplicative inter-poll delay, capped at a maximum interval
// - Hard attempt budget plus an optional wall-clock deadline
// - Failed statuses stop the loop at once with the remote reason verbatim
// - Completed payloads are returned untouched
//
// Used by: services/nanana.rs (job status), services/ytconvert.rs (conversion
// status), mailbox.rs (OTP inbox)

use crate::error::FlowError;
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Outcome of a single status check.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus<T> {
    Pending,
    Completed(T),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay before the first retry.
    pub interval: Duration,
    /// Maximum number of status checks.
    pub max_attempts: u32,
    /// Multiplier applied to the delay after every sleep. 1.0 keeps it fixed.
    pub backoff_factor: f64,
    pub max_interval: Duration,
    /// Absolute ceiling on the whole loop, measured from the first call.
    pub deadline: Option<Duration>,
    /// Sleep before the first check as well (for jobs that are never ready instantly).
    pub delay_first: bool,
}

impl PollPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff_factor: 1.0,
            max_interval: interval,
            deadline: None,
            delay_first: false,
        }
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn delay_first(mut self) -> Self {
        self.delay_first = true;
        self
    }

    pub fn next_delay(&self, current: Duration) -> Duration {
        // Scale in f64 and compare against the cap first; Duration::mul_f64 panics on overflow.
        let cap = self.max_interval.as_secs_f64();
        let next = current.as_secs_f64() * self.backoff_factor;
        if next.is_finite() && next < cap {
            Duration::from_secs_f64(next)
        } else {
            self.max_interval
        }
    }
}

/// Poll `check` until it reports a terminal status.
///
/// `label` names the wait in logs and in the timeout error (`"<label> timeout"`).
/// `check` receives the 1-based attempt number. Errors from `check` end the
/// loop immediately.
pub async fn poll_until_done<T, F, Fut>(
    label: &str,
    policy: &PollPolicy,
    mut check: F,
) -> Result<T, FlowError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<JobStatus<T>, FlowError>>,
{
    let started = Instant::now();
    let mut delay = policy.interval;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 || policy.delay_first {
            sleep(delay).await;
            delay = policy.next_delay(delay);
        }

        if let Some(deadline) = policy.deadline {
            if started.elapsed() >= deadline {
                warn!("[POLL] {} passed its {:?} deadline after {} attempts", label, deadline, attempt - 1);
                return Err(FlowError::timeout(format!("{} timeout", label)));
            }
        }

        match check(attempt).await? {
            JobStatus::Completed(payload) => {
                debug!("[POLL] {} completed on attempt {}", label, attempt);
                return Ok(payload);
            }
            JobStatus::Failed(reason) => {
                warn!("[POLL] {} failed on attempt {}: {}", label, attempt, reason);
                return Err(FlowError::UpstreamFailure(reason));
            }
            JobStatus::Pending => {
                debug!("[POLL] {} still pending (attempt {}/{})", label, attempt, policy.max_attempts);
            }
        }
    }

    warn!("[POLL] {} exhausted {} attempts", label, policy.max_attempts);
    Err(FlowError::timeout(format!("{} timeout", label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_payload_is_returned_unmodified() {
        let calls = counter();
        let policy = PollPolicy::fixed(Duration::from_secs(5), 30);

        let c = calls.clone();
        let result = poll_until_done("Job", &policy, move |attempt| {
            c.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Ok(JobStatus::Pending)
                } else {
                    Ok(JobStatus::Completed(vec!["a".to_string(), "b".to_string()]))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_forever_times_out_after_budget() {
        let calls = counter();
        let policy = PollPolicy::fixed(Duration::from_secs(2), 7);

        let c = calls.clone();
        let err = poll_until_done::<(), _, _>("Conversion", &policy, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(JobStatus::Pending) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, FlowError::UpstreamTimeout(_)));
        assert_eq!(err.to_string(), "Conversion timeout");
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stops_immediately_with_reason() {
        let calls = counter();
        let policy = PollPolicy::fixed(Duration::from_secs(2), 50);

        let c = calls.clone();
        let err = poll_until_done::<(), _, _>("Conversion", &policy, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(JobStatus::Failed("Video is private".to_string())) }
        })
        .await
        .unwrap_err();

        match err {
            FlowError::UpstreamFailure(reason) => assert_eq!(reason, "Video is private"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_propagates() {
        let policy = PollPolicy::fixed(Duration::from_secs(1), 10);
        let err = poll_until_done::<(), _, _>("Job", &policy, |_| async {
            Err(FlowError::upstream("malformed response"))
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "malformed response");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_loop_short() {
        let calls = counter();
        let policy = PollPolicy::fixed(Duration::from_secs(2), 1_000)
            .with_deadline(Duration::from_secs(10));

        let c = calls.clone();
        let err = poll_until_done::<(), _, _>("Conversion", &policy, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(JobStatus::Pending) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, FlowError::UpstreamTimeout(_)));
        // checks at t = 0, 2, 4, 6, 8; the sixth would start at t = 10
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_first_sleeps_before_first_check() {
        let policy = PollPolicy::fixed(Duration::from_secs(5), 3).delay_first();
        let started = Instant::now();

        let elapsed = poll_until_done("Job", &policy, |_| {
            let at = started.elapsed();
            async move { Ok(JobStatus::Completed(at)) }
        })
        .await
        .unwrap();

        assert_eq!(elapsed, Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = PollPolicy::fixed(Duration::from_secs(2), 10)
            .with_backoff(2.0, Duration::from_secs(10));

        let d1 = policy.next_delay(policy.interval);
        let d2 = policy.next_delay(d1);
        let d3 = policy.next_delay(d2);
        assert_eq!(d1, Duration::from_secs(4));
        assert_eq!(d2, Duration::from_secs(8));
        assert_eq!(d3, Duration::from_secs(10));
    }

    #[test]
    fn test_huge_backoff_factor_clamps_to_cap() {
        let policy = PollPolicy::fixed(Duration::from_secs(2), 10)
            .with_backoff(1e20, Duration::from_secs(10));
        assert_eq!(policy.next_delay(policy.interval), Duration::from_secs(10));

        let policy = PollPolicy::fixed(Duration::from_secs(2), 10)
            .with_backoff(f64::INFINITY, Duration::from_secs(10));
        assert_eq!(policy.next_delay(policy.interval), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_spaces_checks_inside_loop() {
        let policy = PollPolicy::fixed(Duration::from_secs(2), 5)
            .with_backoff(2.0, Duration::from_secs(10));
        let started = Instant::now();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let s = seen.clone();
        let err = poll_until_done::<(), _, _>("Conversion", &policy, move |_| {
            s.lock().unwrap().push(started.elapsed().as_secs());
            async { Ok(JobStatus::Pending) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Conversion timeout");
        // delays 2, 4, 8, then capped at 10
        assert_eq!(*seen.lock().unwrap(), vec![0, 2, 6, 14, 24]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_backoff_factor_times_out_without_panic() {
        let policy = PollPolicy::fixed(Duration::from_secs(2), 3)
            .with_backoff(1e20, Duration::from_secs(10));

        let err = poll_until_done::<(), _, _>("Conversion", &policy, |_| async { Ok(JobStatus::Pending) })
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::UpstreamTimeout(_)));
        assert_eq!(err.to_string(), "Conversion timeout");
    }

    #[test]
    fn test_fixed_policy_never_grows() {
        let policy = PollPolicy::fixed(Duration::from_secs(3), 20);
        assert_eq!(policy.next_delay(policy.interval), Duration::from_secs(3));
    }
}
