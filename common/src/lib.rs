// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Common Modul for the position source
//!
//! Provides the common data types that are shared by the providers, the
//! position source and the user interface binding.

pub mod error;
pub mod position;
