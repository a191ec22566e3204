//! Bounded polling for external state

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// How often to look and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Poll {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

#[derive(Debug)]
pub enum WaitError<T, E> {
    /// The condition never held. `last` is the final observation, if any
    /// probe completed.
    TimedOut { last: Option<T>, after: Duration },
    /// A probe failed outright.
    Probe(E),
}

/// Probes until `accept` holds for an observation or `poll.timeout` elapses.
///
/// The first probe always runs, even with a zero timeout. A probe that is
/// still pending when the deadline passes is abandoned.
pub async fn await_condition<T, E, P, Fut, A>(
    mut probe: P,
    accept: A,
    poll: Poll,
) -> Result<T, WaitError<T, E>>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    A: Fn(&T) -> bool,
{
    let started = Instant::now();
    let deadline = started + poll.timeout;
    let mut last = None;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let observed = match tokio::time::timeout(remaining, probe()).await {
            Ok(observed) => observed.map_err(WaitError::Probe)?,
            Err(_) => {
                return Err(WaitError::TimedOut {
                    last,
                    after: started.elapsed(),
                });
            }
        };

        if accept(&observed) {
            return Ok(observed);
        }
        last = Some(observed);

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::TimedOut {
                last,
                after: started.elapsed(),
            });
        }
        tokio::time::sleep(poll.interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn poll(interval_ms: u64, timeout_ms: u64) -> Poll {
        Poll::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_accepted_observation() {
        let probes = &AtomicUsize::new(0);
        let result: Result<usize, WaitError<usize, ()>> = await_condition(
            move || async move { Ok(probes.fetch_add(1, Ordering::SeqCst)) },
            |n| *n == 3,
            poll(100, 10_000),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(probes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_last_observation() {
        let result: Result<&str, WaitError<&str, ()>> = await_condition(
            || async { Ok("STARTING") },
            |state| *state == "RUNNING",
            poll(1_000, 5_000),
        )
        .await;

        match result {
            Err(WaitError::TimedOut { last, after }) => {
                assert_eq!(last, Some("STARTING"));
                assert_eq!(after, Duration::from_millis(5_000));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_stops_polling() {
        let probes = &AtomicUsize::new(0);
        let result: Result<(), WaitError<(), &str>> = await_condition(
            move || async move {
                probes.fetch_add(1, Ordering::SeqCst);
                Err("listing unavailable")
            },
            |_| true,
            poll(100, 10_000),
        )
        .await;

        assert!(matches!(result, Err(WaitError::Probe("listing unavailable"))));
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_is_bounded() {
        let result: Result<(), WaitError<(), ()>> = await_condition(
            || std::future::pending::<Result<(), ()>>(),
            |_| true,
            poll(100, 2_000),
        )
        .await;

        match result {
            Err(WaitError::TimedOut { last: None, after }) => {
                assert_eq!(after, Duration::from_millis(2_000));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_still_probes_once() {
        let result: Result<bool, WaitError<bool, ()>> =
            await_condition(|| async { Ok(true) }, |ok| *ok, poll(100, 0)).await;
        assert!(result.unwrap());
    }
}
