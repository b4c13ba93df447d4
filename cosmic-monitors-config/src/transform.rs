// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Output transform as stored in `monitors.xml`.
///
/// The discriminants follow the wayland `wl_output.transform` ordering, which is
/// also the bit index used by CRTC transform capability masks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transform {
    #[default]
    Normal,
    _90,
    _180,
    _270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

/// The rotation part of a [`Transform`], named the way the file format names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Normal,
    Left,
    UpsideDown,
    Right,
}

impl Rotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rotation::Normal => "normal",
            Rotation::Left => "left",
            Rotation::UpsideDown => "upside_down",
            Rotation::Right => "right",
        }
    }

    pub fn from_name(name: &str) -> Option<Rotation> {
        match name {
            "normal" => Some(Rotation::Normal),
            "left" => Some(Rotation::Left),
            "upside_down" => Some(Rotation::UpsideDown),
            "right" => Some(Rotation::Right),
            _ => None,
        }
    }
}

impl Transform {
    pub const ALL: [Transform; 8] = [
        Transform::Normal,
        Transform::_90,
        Transform::_180,
        Transform::_270,
        Transform::Flipped,
        Transform::Flipped90,
        Transform::Flipped180,
        Transform::Flipped270,
    ];

    pub fn new(rotation: Rotation, flipped: bool) -> Transform {
        match (rotation, flipped) {
            (Rotation::Normal, false) => Transform::Normal,
            (Rotation::Left, false) => Transform::_90,
            (Rotation::UpsideDown, false) => Transform::_180,
            (Rotation::Right, false) => Transform::_270,
            (Rotation::Normal, true) => Transform::Flipped,
            (Rotation::Left, true) => Transform::Flipped90,
            (Rotation::UpsideDown, true) => Transform::Flipped180,
            (Rotation::Right, true) => Transform::Flipped270,
        }
    }

    pub fn rotation(&self) -> Rotation {
        match self {
            Transform::Normal | Transform::Flipped => Rotation::Normal,
            Transform::_90 | Transform::Flipped90 => Rotation::Left,
            Transform::_180 | Transform::Flipped180 => Rotation::UpsideDown,
            Transform::_270 | Transform::Flipped270 => Rotation::Right,
        }
    }

    pub fn is_flipped(&self) -> bool {
        matches!(
            self,
            Transform::Flipped | Transform::Flipped90 | Transform::Flipped180 | Transform::Flipped270
        )
    }

    /// Whether width and height of the mode are swapped on screen.
    pub fn is_rotated(&self) -> bool {
        matches!(self.rotation(), Rotation::Left | Rotation::Right)
    }

    /// Bit index, as used in hardware capability masks.
    pub fn index(&self) -> u32 {
        *self as u32
    }
}
