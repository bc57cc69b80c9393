// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Providers and consumers for tests of code that depends on a position provider.

use crate::{PositionEvents, PositionProvider, ProviderFactory, Reporter};
use common::{error::PositioningError, position::PositionInfo};
use std::{
    io::{Error, ErrorKind},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// A report received by a [`ChannelSink`].
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderEvent {
    Position(PositionInfo),
    Error(PositioningError),
}

/// Consumer that forwards every report into a channel.
pub struct ChannelSink {
    sender: UnboundedSender<ProviderEvent>,
}

impl PositionEvents for ChannelSink {
    fn on_position_updated(&self, info: &PositionInfo) {
        let _ = self.sender.send(ProviderEvent::Position(*info));
    }

    fn on_error(&self, error: PositioningError) {
        let _ = self.sender.send(ProviderEvent::Error(error));
    }
}

/// Creates a [`ChannelSink`] and the receiver of its reports.
pub fn channel_sink() -> (Arc<dyn PositionEvents>, UnboundedReceiver<ProviderEvent>) {
    let (sender, receiver) = unbounded_channel();
    (Arc::new(ChannelSink { sender }), receiver)
}

/// A provider whose reports are pushed by the test.
///
/// Pushed reports are delivered synchronously, whether updates are started or not,
/// so consumers can be checked against reports that arrive while disabled.
pub struct ManualProvider {
    reporter: Reporter,
    active: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ManualProvider {
    pub fn new(sink: Arc<dyn PositionEvents>) -> Self {
        ManualProvider {
            reporter: Reporter::new(sink),
            active: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Reports `info` to the consumer.
    pub fn push_position(&self, info: PositionInfo) {
        self.reporter.position(info);
    }

    /// Reports `error` to the consumer.
    pub fn push_error(&self, error: PositioningError) {
        self.reporter.error(error);
    }

    /// Number of `start_updates` calls.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop_updates` calls.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl PositionProvider for ManualProvider {
    fn source_name(&self) -> &str {
        "manual"
    }

    fn start_updates(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
    }

    fn stop_updates(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn error(&self) -> Option<PositioningError> {
        self.reporter.last_error()
    }

    fn last_known_position(&self) -> Option<PositionInfo> {
        self.reporter.last_position()
    }
}

/// Gives a test access to the [`ManualProvider`] created by [`manual_factory`].
#[derive(Default)]
pub struct ManualProviderSlot {
    provider: Mutex<Option<Arc<ManualProvider>>>,
    created: AtomicUsize,
}

impl ManualProviderSlot {
    /// The most recently created provider.
    pub fn provider(&self) -> Option<Arc<ManualProvider>> {
        self.provider
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of providers the factory created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

/// Returns a factory creating [`ManualProvider`]s and the slot exposing them.
pub fn manual_factory() -> (ProviderFactory, Arc<ManualProviderSlot>) {
    let slot = Arc::new(ManualProviderSlot::default());
    let factory_slot = slot.clone();
    let factory: ProviderFactory = Box::new(move |sink| {
        let provider = Arc::new(ManualProvider::new(sink));
        factory_slot.created.fetch_add(1, Ordering::SeqCst);
        *factory_slot
            .provider
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(provider.clone());
        let provider: Arc<dyn PositionProvider> = provider;
        Ok(provider)
    });
    (factory, slot)
}

/// Returns a factory that never manages to create a provider.
pub fn failing_factory() -> ProviderFactory {
    Box::new(|_| {
        Err(Error::new(
            ErrorKind::NotFound,
            "no position provider available",
        ))
    })
}
