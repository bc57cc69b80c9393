// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Binding of singletons into a declarative user interface.

use crate::PositionSource;
use serde_json::Value;
use std::{
    any::Any,
    collections::HashMap,
    io::{Error, ErrorKind},
};
use tracing::debug;

/// Returns the singleton instance when the user interface first resolves it.
pub type SingletonProvider = fn(&UiEngine) -> &'static (dyn Any + Send + Sync);

struct SingletonType {
    major: u8,
    minor: u8,
    provider: SingletonProvider,
}

/// Registry of the singletons a markup based user interface can bind to.
///
/// Singletons are registered per module `uri` under a type `name` and resolved
/// lazily, the provider is called on every lookup.
#[derive(Default)]
pub struct UiEngine {
    singletons: HashMap<(String, String), SingletonType>,
}

impl UiEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a singleton type.
    ///
    /// Type names must start with an uppercase letter. Registering the same
    /// `uri` and `name` twice fails with [`ErrorKind::AlreadyExists`].
    pub fn register_singleton_type(
        &mut self,
        uri: &str,
        major: u8,
        minor: u8,
        name: &str,
        provider: SingletonProvider,
    ) -> Result<(), Error> {
        if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Singleton type name {name} must start with an uppercase letter"),
            ));
        }
        let key = (uri.to_string(), name.to_string());
        if self.singletons.contains_key(&key) {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("Singleton {uri}/{name} is already registered"),
            ));
        }
        debug!("Registered singleton {uri}/{name} {major}.{minor}");
        self.singletons.insert(
            key,
            SingletonType {
                major,
                minor,
                provider,
            },
        );
        Ok(())
    }

    /// Resolves the singleton registered as `uri`/`name` if it is of type `T`.
    pub fn singleton<T: Any>(&self, uri: &str, name: &str) -> Option<&'static T> {
        let singleton = self
            .singletons
            .get(&(uri.to_string(), name.to_string()))?;
        let instance = (singleton.provider)(self);
        instance.downcast_ref::<T>()
    }

    /// The version a singleton was registered with.
    pub fn version(&self, uri: &str, name: &str) -> Option<(u8, u8)> {
        self.singletons
            .get(&(uri.to_string(), name.to_string()))
            .map(|singleton| (singleton.major, singleton.minor))
    }
}

/// Property access by name, as used by declarative bindings.
pub trait Bindable {
    /// Returns the current value of the property `name`.
    ///
    /// A known property without a value yet is [`Value::Null`], an unknown one is `None`.
    fn property(&self, name: &str) -> Option<Value>;

    /// Writes the property `name`.
    ///
    /// Fails with [`ErrorKind::NotFound`] for unknown properties,
    /// [`ErrorKind::PermissionDenied`] for read-only ones and
    /// [`ErrorKind::InvalidInput`] for values of the wrong type.
    fn set_property(&self, name: &str, value: Value) -> Result<(), Error>;
}

impl Bindable for PositionSource {
    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "enabled" => Some(Value::Bool(self.enabled())),
            "coordinate" => {
                let coordinate = self.coordinate();
                if !coordinate.is_valid() {
                    return Some(Value::Null);
                }
                serde_json::to_value(coordinate).ok()
            }
            _ => None,
        }
    }

    fn set_property(&self, name: &str, value: Value) -> Result<(), Error> {
        match name {
            "enabled" => {
                let enabled = value.as_bool().ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidInput,
                        format!("enabled expects a boolean, got {value}"),
                    )
                })?;
                self.set_enabled(enabled);
                Ok(())
            }
            "coordinate" => Err(Error::new(
                ErrorKind::PermissionDenied,
                "coordinate is read-only",
            )),
            _ => Err(Error::new(
                ErrorKind::NotFound,
                format!("PositionSource has no property {name}"),
            )),
        }
    }
}
