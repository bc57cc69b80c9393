// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Position providers
//!
//! Provides the interface between a positioning device and its consumer and
//! the providers that are available on linux based systems.

use common::{error::PositioningError, position::PositionInfo};
use std::sync::{Arc, Mutex};

/// Capability interface a provider reports its updates to.
///
/// The consumer is registered when the provider is created. Both callbacks are
/// invoked synchronously from the context the provider delivers in and must not block.
pub trait PositionEvents: Send + Sync {
    /// A new fix was reported. The fix may be invalid.
    fn on_position_updated(&self, info: &PositionInfo);

    /// The provider ran into an error. The provider keeps running.
    fn on_error(&self, error: PositioningError);
}

/// Common interface that every position provider must support.
pub trait PositionProvider: Send + Sync {
    /// Human readable name of the provider, e.g. for diagnostics.
    fn source_name(&self) -> &str;

    /// Requests the provider to deliver position updates.
    ///
    /// Calling it on an active provider has no effect.
    fn start_updates(&self);

    /// Requests the provider to stop delivering position updates.
    fn stop_updates(&self);

    /// Returns `true` while the provider is delivering updates.
    fn is_active(&self) -> bool;

    /// The last error reported by the provider.
    fn error(&self) -> Option<PositioningError>;

    /// The last fix reported by the provider, valid or not.
    fn last_known_position(&self) -> Option<PositionInfo>;
}

/// Creates a provider that reports to the given consumer.
pub type ProviderFactory = Box<
    dyn Fn(Arc<dyn PositionEvents>) -> std::io::Result<Arc<dyn PositionProvider>> + Send + Sync,
>;

/// Forwards the reports of a provider to its consumer and remembers the last ones.
pub(crate) struct Reporter {
    sink: Arc<dyn PositionEvents>,
    last_position: Mutex<Option<PositionInfo>>,
    last_error: Mutex<Option<PositioningError>>,
}

impl Reporter {
    pub(crate) fn new(sink: Arc<dyn PositionEvents>) -> Self {
        Reporter {
            sink,
            last_position: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn position(&self, info: PositionInfo) {
        *self
            .last_position
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(info);
        self.sink.on_position_updated(&info);
    }

    pub(crate) fn error(&self, error: PositioningError) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
        self.sink.on_error(error);
    }

    pub(crate) fn last_position(&self) -> Option<PositionInfo> {
        *self.last_position.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn last_error(&self) -> Option<PositioningError> {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub mod gpsd_source;
pub mod replay_source;
pub mod test_helper;
