// SPDX-License-Identifier: GPL-3.0-only

//! Display configuration for cosmic: picks, remembers and applies a layout for
//! whatever set of outputs is connected.

pub mod backend;
pub mod config;
pub mod dbus;
pub mod state;
pub mod utils;
