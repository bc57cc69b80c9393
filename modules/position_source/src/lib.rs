// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Position source of the ground station
//!
//! Exposes the position of the device the application runs on as an
//! observable `enabled` and `coordinate` property pair that a declarative
//! user interface can bind to.

use common::{
    error::PositioningError,
    position::{GeoCoordinate, PositionInfo},
};
use gnss::{
    PositionEvents, PositionProvider, ProviderFactory,
    gpsd_source::{GpsdConfig, GpsdProvider},
};
use module_core::{Event, EventBus, EventKind};
use std::{
    io::{Error, ErrorKind},
    sync::{Arc, Mutex, OnceLock, RwLock},
};
use tracing::{debug, error, info};

pub mod ui;

/// Name under which the singleton is registered in a [`ui::UiEngine`].
pub const UI_TYPE_NAME: &str = "PositionSource";

static INSTANCE: OnceLock<PositionSource> = OnceLock::new();
static DEFAULT_FACTORY: Mutex<Option<ProviderFactory>> = Mutex::new(None);

/// The property values. Both live under one lock so no fix is taken over after disabling.
struct Properties {
    enabled: bool,
    coordinate: GeoCoordinate,
}

/// The observable state, shared with the provider as its consumer.
struct SourceState {
    properties: RwLock<Properties>,
    event_bus: EventBus,
}

impl SourceState {
    fn set_position_info(&self, info: &PositionInfo) {
        if !info.is_valid() {
            debug!("Ignoring invalid position info");
            return;
        }
        let coordinate = info.coordinate();
        {
            let mut properties = self.properties.write().unwrap_or_else(|e| e.into_inner());
            if !properties.enabled {
                debug!("Ignoring position info while disabled");
                return;
            }
            properties.coordinate = coordinate;
        }
        self.event_bus.publish(&Event {
            kind: EventKind::CoordinateChangedEvent(coordinate),
        });
    }

    fn set_position_source_error(&self, positioning_error: PositioningError) {
        error!("Position source error {positioning_error:?}: {positioning_error}");
    }
}

impl PositionEvents for SourceState {
    fn on_position_updated(&self, info: &PositionInfo) {
        self.set_position_info(info);
    }

    fn on_error(&self, error: PositioningError) {
        self.set_position_source_error(error);
    }
}

/// Manages the position source of the ground station.
///
/// A `PositionSource` owns exactly one [`PositionProvider`], created on the
/// first [`set_enabled(true)`](Self::set_enabled) and reused afterwards. It
/// mirrors whether updates are requested and the last valid coordinate. It
/// publishes [`EventKind::EnabledChangedEvent`] on its [`EventBus`] when the
/// flag changes and [`EventKind::CoordinateChangedEvent`] for every valid fix
/// taken over.
///
/// The coordinate is sticky: errors and disabling keep the last known value.
/// Provider errors are logged and otherwise ignored.
pub struct PositionSource {
    state: Arc<SourceState>,
    provider: Mutex<Option<Arc<dyn PositionProvider>>>,
    factory: ProviderFactory,
}

impl PositionSource {
    /// Creates a position source that is independent of the process wide instance.
    ///
    /// The provider is created by `factory` the first time the source is enabled.
    pub fn with_factory(factory: ProviderFactory) -> Self {
        PositionSource {
            state: Arc::new(SourceState {
                properties: RwLock::new(Properties {
                    enabled: false,
                    coordinate: GeoCoordinate::default(),
                }),
                event_bus: EventBus::default(),
            }),
            provider: Mutex::new(None),
            factory,
        }
    }

    /// Returns the process wide instance, constructing it on the first call.
    ///
    /// The instance uses the factory passed to [`install_default_factory`](Self::install_default_factory)
    /// or a gpsd provider on `127.0.0.1:2947` when none was installed.
    pub fn instance() -> &'static PositionSource {
        INSTANCE.get_or_init(|| {
            let factory = DEFAULT_FACTORY
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take()
                .unwrap_or_else(|| {
                    info!("No position provider installed, falling back to gpsd");
                    GpsdProvider::factory(GpsdConfig::default())
                });
            PositionSource::with_factory(factory)
        })
    }

    /// Installs the factory the process wide instance creates its provider with.
    ///
    /// Fails with [`ErrorKind::AlreadyExists`] once the instance was constructed.
    pub fn install_default_factory(factory: ProviderFactory) -> Result<(), Error> {
        if INSTANCE.get().is_some() {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                "position source is already constructed",
            ));
        }
        *DEFAULT_FACTORY.lock().unwrap_or_else(|e| e.into_inner()) = Some(factory);
        Ok(())
    }

    /// Returns the instance to the singleton registration of a [`ui::UiEngine`].
    pub fn ui_singleton_register(_engine: &ui::UiEngine) -> &'static PositionSource {
        PositionSource::instance()
    }

    /// Registers the process wide instance as `PositionSource` 1.0 under `uri`.
    pub fn register(engine: &mut ui::UiEngine, uri: &str) -> Result<(), Error> {
        engine.register_singleton_type(uri, 1, 0, UI_TYPE_NAME, singleton_provider)
    }

    /// Returns `true` if the provider is requested to deliver updates.
    pub fn enabled(&self) -> bool {
        self.state
            .properties
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .enabled
    }

    /// Starts or stops the position updates.
    ///
    /// Setting the current value again does nothing. If no provider can be
    /// created the source stays disabled.
    pub fn set_enabled(&self, enabled: bool) {
        let mut provider = self.provider.lock().unwrap_or_else(|e| e.into_inner());
        if self.enabled() == enabled {
            return;
        }
        self.create_position_source(&mut provider);
        let Some(source) = provider.as_ref() else {
            return;
        };
        self.state
            .properties
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .enabled = enabled;
        if enabled {
            source.start_updates();
        } else {
            source.stop_updates();
        }
        drop(provider);
        debug!("Position source enabled: {enabled}");
        self.state.event_bus.publish(&Event {
            kind: EventKind::EnabledChangedEvent(enabled),
        });
    }

    /// Takes over the coordinate of a valid fix.
    ///
    /// Invalid fixes and fixes that arrive while disabled are ignored.
    pub fn set_position_info(&self, info: &PositionInfo) {
        self.state.set_position_info(info);
    }

    /// Returns the last valid coordinate.
    pub fn coordinate(&self) -> GeoCoordinate {
        self.state
            .properties
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .coordinate
    }

    /// Returns the provider of this source once it was created.
    pub fn position_info_source(&self) -> Option<Arc<dyn PositionProvider>> {
        self.provider
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The bus the change notifications are published on.
    pub fn event_bus(&self) -> &EventBus {
        &self.state.event_bus
    }

    /// Subscribes to the change notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.state.event_bus.subscribe()
    }

    fn create_position_source(&self, provider: &mut Option<Arc<dyn PositionProvider>>) {
        if provider.is_some() {
            return;
        }
        let sink: Arc<dyn PositionEvents> = self.state.clone();
        match (self.factory)(sink) {
            Ok(created) => {
                info!("Created position provider {}", created.source_name());
                *provider = Some(created);
            }
            Err(e) => error!("Failed to create position provider. Error: {e}"),
        }
    }
}

fn singleton_provider(
    engine: &ui::UiEngine,
) -> &'static (dyn std::any::Any + Send + Sync) {
    PositionSource::ui_singleton_register(engine)
}
