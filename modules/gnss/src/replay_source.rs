// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{PositionEvents, PositionProvider, ProviderFactory, Reporter};
use chrono::Utc;
use common::{
    error::PositioningError,
    position::{GeoCoordinate, PositionInfo},
};
use std::{
    io::{Error, ErrorKind},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tracing::debug;

/// A provider that replays a fixed list of coordinates in a constant frequency.
///
/// Every tick reports the next coordinate stamped with the current UTC time.
/// After the last coordinate the replay starts over with the first one.
/// Stopping and restarting continues with the coordinate after the last reported one.
pub struct ReplayProvider {
    coordinates: Arc<Vec<GeoCoordinate>>,
    interval: Duration,
    next: Arc<AtomicUsize>,
    runtime: tokio::runtime::Handle,
    reporter: Arc<Reporter>,
    ticker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ReplayProvider {
    /// Creates a new replay provider. Must be called within a tokio runtime.
    pub fn new(
        coordinates: &[GeoCoordinate],
        interval: Duration,
        sink: Arc<dyn PositionEvents>,
    ) -> Result<Self, Error> {
        if coordinates.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "coordinates parameter is empty",
            ));
        }
        if interval.is_zero() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "replay interval must not be zero",
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::other(format!("replay provider requires a tokio runtime. Error: {e}"))
        })?;
        Ok(ReplayProvider {
            coordinates: Arc::new(coordinates.to_vec()),
            interval,
            next: Arc::new(AtomicUsize::new(0)),
            runtime,
            reporter: Arc::new(Reporter::new(sink)),
            ticker: Mutex::new(None),
        })
    }

    /// Returns a factory creating [`ReplayProvider`]s for the given coordinates.
    pub fn factory(coordinates: Vec<GeoCoordinate>, interval: Duration) -> ProviderFactory {
        Box::new(move |sink| {
            let provider: Arc<dyn PositionProvider> =
                Arc::new(ReplayProvider::new(&coordinates, interval, sink)?);
            Ok(provider)
        })
    }
}

async fn replay_task(
    coordinates: Arc<Vec<GeoCoordinate>>,
    interval: Duration,
    next: Arc<AtomicUsize>,
    reporter: Arc<Reporter>,
) {
    let mut timer = tokio::time::interval(interval);
    loop {
        timer.tick().await;
        let index = next.load(Ordering::Relaxed);
        next.store((index + 1) % coordinates.len(), Ordering::Relaxed);
        reporter.position(PositionInfo::new(coordinates[index], Utc::now()));
    }
}

impl PositionProvider for ReplayProvider {
    fn source_name(&self) -> &str {
        "replay"
    }

    fn start_updates(&self) {
        let mut ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if ticker.is_some() {
            return;
        }
        debug!(
            "Starting replay of {} coordinates every {:?}",
            self.coordinates.len(),
            self.interval
        );
        let coordinates = self.coordinates.clone();
        let next = self.next.clone();
        let reporter = self.reporter.clone();
        let interval = self.interval;
        *ticker = Some(
            self.runtime
                .spawn(async move { replay_task(coordinates, interval, next, reporter).await }),
        );
    }

    fn stop_updates(&self) {
        if let Some(handle) = self.ticker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            debug!("Stopping replay");
            handle.abort();
        }
    }

    fn is_active(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn error(&self) -> Option<PositioningError> {
        self.reporter.last_error()
    }

    fn last_known_position(&self) -> Option<PositionInfo> {
        self.reporter.last_position()
    }
}

impl Drop for ReplayProvider {
    fn drop(&mut self) {
        self.stop_updates();
    }
}
