// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// Placeholder for EDID fields that could not be read.
pub const UNKNOWN: &str = "unknown";

/// Connector prefixes of built-in laptop panels.
const BUILTIN_PREFIXES: &[&str] = &["LVDS", "eDP", "DSI"];

/// Stable identity of a physical output: the connector it is plugged into and
/// the monitor's EDID identification.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputKey {
    pub connector: String,
    pub vendor: String,
    pub product: String,
    pub serial: String,
}

fn or_unknown(value: impl Into<String>) -> String {
    let value = value.into();
    if value.is_empty() {
        UNKNOWN.into()
    } else {
        value
    }
}

impl OutputKey {
    pub fn new(
        connector: impl Into<String>,
        vendor: impl Into<String>,
        product: impl Into<String>,
        serial: impl Into<String>,
    ) -> OutputKey {
        OutputKey {
            connector: connector.into(),
            vendor: or_unknown(vendor),
            product: or_unknown(product),
            serial: or_unknown(serial),
        }
    }

    /// Whether the connector looks like an internal laptop panel.
    pub fn is_builtin(&self) -> bool {
        is_builtin_connector(&self.connector)
    }
}

pub fn is_builtin_connector(connector: &str) -> bool {
    BUILTIN_PREFIXES
        .iter()
        .any(|prefix| connector.starts_with(prefix))
}

#[cfg(feature = "libdisplay-info")]
impl OutputKey {
    pub fn from_vendor_product(
        connector: impl Into<String>,
        vp: libdisplay_info::edid::VendorProduct,
    ) -> OutputKey {
        OutputKey::new(
            connector,
            vp.manufacturer.iter().collect::<String>(),
            format!("0x{:04x}", vp.product),
            vp.serial
                .map(|serial| format!("0x{:08x}", serial))
                .unwrap_or_default(),
        )
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// What the user (or the synthesizer) wants a single output to look like.
#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq)]
pub struct OutputIntent {
    pub enabled: bool,
    pub rect: Rect,
    pub refresh_rate: f32,
    pub transform: Transform,
    pub is_primary: bool,
    pub is_presentation: bool,
    pub is_underscanning: bool,
}

impl OutputIntent {
    pub fn disabled() -> OutputIntent {
        OutputIntent::default()
    }

    /// Disabled intents carry no layout, so all of them compare equal.
    pub fn canonical(self) -> OutputIntent {
        if self.enabled {
            self
        } else {
            OutputIntent::disabled()
        }
    }
}
