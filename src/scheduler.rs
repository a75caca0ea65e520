// AutoDNS - Periodic Scheduler
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Periodic tick loop with a cancellable handle.
//!
//! The first tick fires immediately. Ticks that fall due while the callback
//! is still being called are dropped, never queued. Stopping the loop only
//! cancels future ticks; work the callback already spawned keeps running.

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Handle to a running periodic loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop: Option<oneshot::Sender<()>>,
}

impl SchedulerHandle {
    /// Cancel pending ticks.
    pub fn stop(mut self) {
        self.signal_stop();
    }

    fn signal_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
            debug!("Scheduler stop requested");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

/// Call `on_tick` now and then every `period` until the handle is stopped.
pub fn spawn_periodic<F>(period: Duration, mut on_tick: F) -> SchedulerHandle
where
    F: FnMut() + Send + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = interval.tick() => on_tick(),
            }
        }

        debug!("Scheduler loop ended");
    });

    SchedulerHandle {
        stop: Some(stop_tx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let (count, tick) = counter();
        let _handle = spawn_periodic(Duration::from_secs(5), tick);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_future_ticks() {
        let (count, tick) = counter();
        let handle = spawn_periodic(Duration::from_secs(3), tick);
        tokio::time::sleep(Duration::from_millis(1)).await;

        handle.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_loop() {
        let (count, tick) = counter();
        drop(spawn_periodic(Duration::from_secs(3), tick));
        tokio::time::sleep(Duration::from_secs(30)).await;
        // Dropped before the task was polled: the stop signal wins.
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
