//! Refresh Scheduling
//!
//! [`RefreshTimer`] runs an async function on a fixed, adjustable interval.
//! An out-of-band run can be injected with [`RefreshTimer::run_once`]; the
//! regular cadence then restarts from that run. Failures and panics in the
//! function are logged and the timer keeps going.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Result;

type TimerFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Debug)]
enum Command {
    SetInterval(Duration),
    RunOnce,
    Pause,
    Resume,
}

#[derive(Debug, Clone, Copy)]
struct TimerState {
    interval: Duration,
    paused: bool,
}

/// Repeating timer driving one async function
pub struct RefreshTimer {
    name: &'static str,
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<RwLock<TimerState>>,
    task: JoinHandle<()>,
}

impl RefreshTimer {
    /// Start firing `function` every `interval`.
    ///
    /// `settle_delay` is how long [`run_once`](Self::run_once) waits before
    /// its injected run. Must be called inside a tokio runtime.
    pub fn new<F, Fut>(
        name: &'static str,
        interval: Duration,
        settle_delay: Duration,
        function: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let function: TimerFn = Arc::new(move || function().boxed());
        let state = Arc::new(RwLock::new(TimerState {
            interval,
            paused: false,
        }));
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(Self::run(name, interval, settle_delay, function, rx));

        Self {
            name,
            commands: tx,
            state,
            task,
        }
    }

    /// Current interval
    pub fn interval(&self) -> Duration {
        self.state.read().interval
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    /// Change the interval; the next run is one new interval from now
    pub fn set_interval(&self, interval: Duration) {
        let mut state = self.state.write();
        if state.interval == interval {
            return;
        }
        state.interval = interval;
        self.send(Command::SetInterval(interval));
    }

    /// Cancel the pending tick, run once after the settle delay, then resume
    /// the regular cadence from that run. Ignored while paused.
    pub fn run_once(&self) {
        self.send(Command::RunOnce);
    }

    /// Stop firing until [`resume`](Self::resume)
    pub fn pause(&self) {
        self.state.write().paused = true;
        self.send(Command::Pause);
    }

    /// Resume firing; the next run is one interval from now
    pub fn resume(&self) {
        self.state.write().paused = false;
        self.send(Command::Resume);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("Timer {} is no longer running", self.name);
        }
    }

    async fn run(
        name: &'static str,
        mut interval: Duration,
        settle_delay: Duration,
        function: TimerFn,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut deadline = Instant::now() + interval;
        let mut paused = false;

        loop {
            let tick = async {
                if paused {
                    futures::future::pending::<()>().await
                } else {
                    tokio::time::sleep_until(deadline).await
                }
            };

            tokio::select! {
                command = commands.recv() => {
                    match command {
                        None => break,
                        Some(Command::SetInterval(new_interval)) => {
                            tracing::debug!("Timer {} interval set to {:?}", name, new_interval);
                            interval = new_interval;
                            deadline = Instant::now() + interval;
                        }
                        Some(Command::RunOnce) => {
                            if !paused {
                                deadline = Instant::now() + settle_delay;
                            }
                        }
                        Some(Command::Pause) => paused = true,
                        Some(Command::Resume) => {
                            if paused {
                                paused = false;
                                deadline = Instant::now() + interval;
                            }
                        }
                    }
                }
                _ = tick => {
                    Self::invoke(name, &function).await;
                    deadline = Instant::now() + interval;
                }
            }
        }

        tracing::debug!("Timer {} stopped", name);
    }

    async fn invoke(name: &'static str, function: &TimerFn) {
        tracing::trace!("Timer {} firing", name);
        match tokio::spawn(function()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Timer {} run failed: {}", name, e),
            Err(e) => tracing::error!("Timer {} run panicked: {}", name, e),
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for RefreshTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = *self.state.read();
        f.debug_struct("RefreshTimer")
            .field("name", &self.name)
            .field("interval", &state.interval)
            .field("paused", &state.paused)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const SETTLE: Duration = Duration::from_millis(250);

    fn counting_timer(interval: Duration) -> (RefreshTimer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let timer = RefreshTimer::new("test", interval, SETTLE, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (timer, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_on_interval() {
        let (_timer, count) = counting_timer(Duration::from_secs(30));

        sleep(Duration::from_secs(29)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(66)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_restarts_cadence() {
        let (timer, count) = counting_timer(Duration::from_secs(30));

        sleep(Duration::from_secs(10)).await;
        timer.run_once();

        sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The regular tick at 30s was cancelled
        sleep(Duration::from_secs(25)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Next regular run is 30s after the injected one
        sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_coalesces() {
        let (timer, count) = counting_timer(Duration::from_secs(30));

        timer.run_once();
        timer.run_once();
        timer.run_once();

        sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(29)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume() {
        let (timer, count) = counting_timer(Duration::from_secs(30));

        timer.pause();
        assert!(timer.is_paused());
        sleep(Duration::from_secs(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        timer.run_once();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        timer.resume();
        assert_eq!(timer.interval(), Duration::from_secs(30));
        sleep(Duration::from_secs(31)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_interval() {
        let (timer, count) = counting_timer(Duration::from_secs(30));

        sleep(Duration::from_secs(10)).await;
        timer.set_interval(Duration::from_secs(5));
        assert_eq!(timer.interval(), Duration::from_secs(5));

        sleep(Duration::from_secs(11)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_timer() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let _timer = RefreshTimer::new("failing", Duration::from_secs(1), SETTLE, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 1 {
                    panic!("boom");
                }
                Err(ClientError::Internal("nope".into()))
            }
        });

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
