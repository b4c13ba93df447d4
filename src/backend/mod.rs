// SPDX-License-Identifier: GPL-3.0-only

use bitflags::bitflags;
use cosmic_monitors_config::{Rect, Transform};

pub mod crtc_mapping;
pub mod dummy;

pub type ModeId = u32;
pub type CrtcId = u32;
pub type OutputId = u32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mode {
    pub id: ModeId,
    pub width: i32,
    pub height: i32,
    pub refresh_rate: f32,
}

bitflags! {
    /// Transforms a CRTC can scan out in hardware, indexed like [`Transform::index`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Transforms: u8 {
        const NORMAL = 1 << 0;
        const _90 = 1 << 1;
        const _180 = 1 << 2;
        const _270 = 1 << 3;
        const FLIPPED = 1 << 4;
        const FLIPPED_90 = 1 << 5;
        const FLIPPED_180 = 1 << 6;
        const FLIPPED_270 = 1 << 7;
    }
}

impl Transforms {
    pub fn supports(&self, transform: Transform) -> bool {
        self.bits() & (1 << transform.index()) != 0
    }
}

impl From<Transform> for Transforms {
    fn from(transform: Transform) -> Self {
        Transforms::from_bits_truncate(1 << transform.index())
    }
}

/// What a CRTC currently scans out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrtcState {
    pub mode: ModeId,
    pub rect: Rect,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Crtc {
    pub id: CrtcId,
    pub transforms: Transforms,
    pub current: Option<CrtcState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorType {
    Unknown,
    Vga,
    DviI,
    DviD,
    DviA,
    Composite,
    SVideo,
    Lvds,
    Component,
    DisplayPort,
    HdmiA,
    HdmiB,
    Tv,
    Edp,
    Virtual,
    Dsi,
}

impl ConnectorType {
    /// Prefix the kernel uses in connector names, e.g. `eDP` for `eDP-1`.
    pub fn short_name(&self) -> &'static str {
        match self {
            ConnectorType::Unknown => "Unknown",
            ConnectorType::Vga => "VGA",
            ConnectorType::DviI => "DVI-I",
            ConnectorType::DviD => "DVI-D",
            ConnectorType::DviA => "DVI-A",
            ConnectorType::Composite => "Composite",
            ConnectorType::SVideo => "S-VIDEO",
            ConnectorType::Lvds => "LVDS",
            ConnectorType::Component => "Component",
            ConnectorType::DisplayPort => "DP",
            ConnectorType::HdmiA => "HDMI-A",
            ConnectorType::HdmiB => "HDMI-B",
            ConnectorType::Tv => "TV",
            ConnectorType::Edp => "eDP",
            ConnectorType::Virtual => "Virtual",
            ConnectorType::Dsi => "DSI",
        }
    }

    pub fn from_connector_name(name: &str) -> ConnectorType {
        const ALL: [ConnectorType; 15] = [
            ConnectorType::Vga,
            ConnectorType::DviI,
            ConnectorType::DviD,
            ConnectorType::DviA,
            ConnectorType::Composite,
            ConnectorType::SVideo,
            ConnectorType::Lvds,
            ConnectorType::Component,
            ConnectorType::DisplayPort,
            ConnectorType::HdmiA,
            ConnectorType::HdmiB,
            ConnectorType::Tv,
            ConnectorType::Edp,
            ConnectorType::Virtual,
            ConnectorType::Dsi,
        ];
        let prefix = name.rsplit_once('-').map_or(name, |(prefix, _)| prefix);
        ALL.into_iter()
            .find(|ty| ty.short_name() == prefix)
            .unwrap_or(ConnectorType::Unknown)
    }

    pub fn is_builtin(&self) -> bool {
        matches!(
            self,
            ConnectorType::Lvds | ConnectorType::Edp | ConnectorType::Dsi
        )
    }
}

/// Position of one output inside a tiled monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileInfo {
    pub group_id: u32,
    pub max_h_tiles: u32,
    pub max_v_tiles: u32,
    pub loc_h_tile: u32,
    pub loc_v_tile: u32,
    pub tile_w: i32,
    pub tile_h: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub id: OutputId,
    pub name: String,
    pub vendor: String,
    pub product: String,
    pub serial: String,
    /// Raw EDID blob, if the driver exposes one.
    pub edid: Option<Vec<u8>>,
    pub connector_type: ConnectorType,
    pub modes: Vec<ModeId>,
    pub preferred_mode: Option<ModeId>,
    pub possible_crtcs: Vec<CrtcId>,
    pub possible_clones: Vec<OutputId>,
    pub crtc: Option<CrtcId>,
    pub is_primary: bool,
    pub is_presentation: bool,
    pub is_underscanning: bool,
    pub supports_underscanning: bool,
    /// Set by paravirtual drivers whose preferred mode follows the host window.
    pub hotplug_mode_update: bool,
    pub suggested_position: Option<(i32, i32)>,
    pub tile: Option<TileInfo>,
}

impl Output {
    pub fn is_builtin(&self) -> bool {
        self.connector_type.is_builtin()
    }

    pub fn can_clone(&self, other: OutputId) -> bool {
        self.possible_clones.contains(&other)
    }
}

/// Read-only hardware snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub modes: Vec<Mode>,
    pub crtcs: Vec<Crtc>,
    pub outputs: Vec<Output>,
}

impl Resources {
    pub fn mode(&self, id: ModeId) -> Option<&Mode> {
        self.modes.iter().find(|mode| mode.id == id)
    }

    pub fn crtc(&self, id: CrtcId) -> Option<&Crtc> {
        self.crtcs.iter().find(|crtc| crtc.id == id)
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.iter().find(|output| output.id == id)
    }

    pub fn output_by_name(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|output| output.name == name)
    }

    pub fn preferred_mode(&self, output: &Output) -> Option<&Mode> {
        output.preferred_mode.and_then(|id| self.mode(id))
    }

    pub fn has_hotplug_mode_update(&self) -> bool {
        self.outputs.iter().any(|output| output.hotplug_mode_update)
    }

    /// Whether any output is currently scanned out by a CRTC.
    pub fn any_output_active(&self) -> bool {
        self.outputs.iter().any(|output| output.crtc.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLimits {
    pub max_width: i32,
    pub max_height: i32,
}

impl Default for ScreenLimits {
    fn default() -> Self {
        ScreenLimits {
            max_width: 8192,
            max_height: 8192,
        }
    }
}

/// One CRTC of a solved assignment and the outputs it drives.
#[derive(Debug, Clone, PartialEq)]
pub struct CrtcInfo {
    pub crtc: CrtcId,
    pub mode: ModeId,
    pub x: i32,
    pub y: i32,
    pub transform: Transform,
    pub outputs: Vec<OutputId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputInfo {
    pub output: OutputId,
    pub is_primary: bool,
    pub is_presentation: bool,
    pub is_underscanning: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrtcAssignment {
    pub crtcs: Vec<CrtcInfo>,
    pub outputs: Vec<OutputInfo>,
}

impl CrtcAssignment {
    pub fn crtc_info(&self, crtc: CrtcId) -> Option<&CrtcInfo> {
        self.crtcs.iter().find(|info| info.crtc == crtc)
    }
}

/// Hardware inventory and apply bridge.
pub trait Backend {
    fn resources(&self) -> &Resources;

    fn screen_limits(&self) -> ScreenLimits;

    /// Commits a solved assignment. CRTCs and outputs it does not mention are
    /// switched off. On error the hardware keeps its previous state.
    fn apply_configuration(&mut self, assignment: &CrtcAssignment) -> anyhow::Result<()>;

    /// Re-enumerates the hardware after a hotplug.
    fn read_current(&mut self) -> anyhow::Result<()>;
}
