// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of an error reported by a position provider.
///
/// Providers never fail the caller directly. They report one of these kinds
/// through their error callback and keep running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositioningError {
    /// The provider lacks the permission or the connection to access the device.
    Access,
    /// The connection to the provider was closed.
    Closed,
    /// An error that could not be classified.
    UnknownSource,
    /// No update arrived within the requested update timeout.
    UpdateTimeout,
}

impl fmt::Display for PositioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PositioningError::Access => "access to the positioning device denied",
            PositioningError::Closed => "connection to the positioning device closed",
            PositioningError::UnknownSource => "unknown positioning error",
            PositioningError::UpdateTimeout => "no position update within the update timeout",
        };
        f.write_str(text)
    }
}
