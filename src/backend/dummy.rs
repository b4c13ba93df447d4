// SPDX-License-Identifier: GPL-3.0-only

//! Headless backend keeping its hardware in memory.

use anyhow::{bail, Context, Result};
use cosmic_monitors_config::Rect;
use smithay::utils::{Physical, Size};
use tracing::{debug, info};

use super::{
    Backend, ConnectorType, Crtc, CrtcAssignment, CrtcId, CrtcState, Mode, ModeId, Output,
    OutputId, Resources, ScreenLimits, Transforms,
};
use crate::utils::geometry::TransformExt;

/// Mode every dummy output supports next to its native one.
const FALLBACK_MODE: (i32, i32, f32) = (1024, 768, 60.0);

/// An output with no EDID data and no current CRTC.
pub fn output(id: OutputId, name: &str, modes: Vec<ModeId>, possible_crtcs: Vec<CrtcId>) -> Output {
    Output {
        id,
        name: name.to_string(),
        vendor: String::new(),
        product: String::new(),
        serial: String::new(),
        edid: None,
        connector_type: ConnectorType::from_connector_name(name),
        modes,
        preferred_mode: None,
        possible_crtcs,
        possible_clones: Vec::new(),
        crtc: None,
        is_primary: false,
        is_presentation: false,
        is_underscanning: false,
        supports_underscanning: false,
        hotplug_mode_update: false,
        suggested_position: None,
        tile: None,
    }
}

#[derive(Debug, Default)]
pub struct DummyBackend {
    /// What is physically connected.
    hardware: Resources,
    /// What was enumerated by the last `read_current`.
    snapshot: Resources,
    limits: ScreenLimits,
    fail_applies: bool,
    applied: usize,
}

impl DummyBackend {
    pub fn new(resources: Resources) -> DummyBackend {
        DummyBackend {
            hardware: resources.clone(),
            snapshot: resources,
            ..Default::default()
        }
    }

    /// Builds an inventory from `NAME:WxH@RATE` entries separated by commas,
    /// e.g. `eDP-1:1920x1080@60,DP-1:2560x1440@60`.
    pub fn from_spec(spec: &str) -> Result<DummyBackend> {
        let mut backend = DummyBackend::default();
        for entry in spec.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let (name, mode) = entry
                .split_once(':')
                .with_context(|| format!("Missing mode in output `{}`", entry))?;
            let (size, rate) = mode.split_once('@').unwrap_or((mode, "60"));
            let (width, height) = size
                .split_once('x')
                .with_context(|| format!("Invalid size `{}`", size))?;
            let width = width
                .parse::<i32>()
                .with_context(|| format!("Invalid width `{}`", width))?;
            let height = height
                .parse::<i32>()
                .with_context(|| format!("Invalid height `{}`", height))?;
            let rate = rate
                .parse::<f32>()
                .with_context(|| format!("Invalid refresh rate `{}`", rate))?;
            if width <= 0 || height <= 0 {
                bail!("Output `{}` has an empty mode", name);
            }
            backend.plug(name, width, height, rate);
        }
        backend.snapshot = backend.hardware.clone();
        Ok(backend)
    }

    fn mode_id(&mut self, width: i32, height: i32, refresh_rate: f32) -> ModeId {
        if let Some(mode) = self.hardware.modes.iter().find(|mode| {
            mode.width == width && mode.height == height && mode.refresh_rate == refresh_rate
        }) {
            return mode.id;
        }
        let id = self.hardware.modes.iter().map(|mode| mode.id).max().unwrap_or(0) + 1;
        self.hardware.modes.push(Mode {
            id,
            width,
            height,
            refresh_rate,
        });
        id
    }

    /// Connects a new output with its own CRTC. Takes effect on the next
    /// `read_current`.
    pub fn plug(&mut self, name: &str, width: i32, height: i32, refresh_rate: f32) -> OutputId {
        let preferred = self.mode_id(width, height, refresh_rate);
        let (fw, fh, frate) = FALLBACK_MODE;
        let fallback = self.mode_id(fw, fh, frate);

        let crtc_id = self.hardware.crtcs.iter().map(|crtc| crtc.id).max().unwrap_or(99) + 1;
        self.hardware.crtcs.push(Crtc {
            id: crtc_id,
            transforms: Transforms::all(),
            current: None,
        });
        let crtcs = self
            .hardware
            .crtcs
            .iter()
            .map(|crtc| crtc.id)
            .collect::<Vec<_>>();
        for output in self.hardware.outputs.iter_mut() {
            output.possible_crtcs = crtcs.clone();
        }

        let id = self.hardware.outputs.iter().map(|output| output.id).max().unwrap_or(0) + 1;
        let mut modes = vec![preferred];
        if fallback != preferred {
            modes.push(fallback);
        }
        let mut new = output(id, name, modes, crtcs);
        new.preferred_mode = Some(preferred);
        new.vendor = "CSM".into();
        new.product = format!("0x{:04x}", id);
        new.serial = format!("0x{:08x}", id);
        info!(output = name, "Plugged {}x{}@{}", width, height, refresh_rate);
        self.hardware.outputs.push(new);
        id
    }

    /// Disconnects an output. Takes effect on the next `read_current`.
    pub fn unplug(&mut self, name: &str) -> bool {
        let before = self.hardware.outputs.len();
        self.hardware.outputs.retain(|output| output.name != name);
        before != self.hardware.outputs.len()
    }

    pub fn hardware_mut(&mut self) -> &mut Resources {
        &mut self.hardware
    }

    pub fn set_screen_limits(&mut self, limits: ScreenLimits) {
        self.limits = limits;
    }

    /// Makes every following `apply_configuration` fail, until reset.
    pub fn set_fail_applies(&mut self, fail: bool) {
        self.fail_applies = fail;
    }

    /// Number of successful applies.
    pub fn applied(&self) -> usize {
        self.applied
    }

    fn validate(&self, assignment: &CrtcAssignment) -> Result<()> {
        for info in &assignment.crtcs {
            if self.hardware.crtc(info.crtc).is_none() {
                bail!("Unknown CRTC {}", info.crtc);
            }
            if self.hardware.mode(info.mode).is_none() {
                bail!("Unknown mode {}", info.mode);
            }
            for id in &info.outputs {
                let Some(output) = self.hardware.output(*id) else {
                    bail!("Output {} was disconnected", id);
                };
                if !output.possible_crtcs.contains(&info.crtc) {
                    bail!("Output {} cannot be driven by CRTC {}", output.name, info.crtc);
                }
            }
        }
        Ok(())
    }
}

impl Backend for DummyBackend {
    fn resources(&self) -> &Resources {
        &self.snapshot
    }

    fn screen_limits(&self) -> ScreenLimits {
        self.limits
    }

    fn apply_configuration(&mut self, assignment: &CrtcAssignment) -> Result<()> {
        if self.fail_applies {
            bail!("Mode setting rejected by the driver");
        }
        self.validate(assignment)?;

        let modes = self.hardware.modes.clone();
        for crtc in self.hardware.crtcs.iter_mut() {
            crtc.current = assignment.crtc_info(crtc.id).and_then(|info| {
                let mode = modes.iter().find(|mode| mode.id == info.mode)?;
                let size = info
                    .transform
                    .to_smithay()
                    .transform_size(Size::<i32, Physical>::from((mode.width, mode.height)));
                Some(CrtcState {
                    mode: mode.id,
                    rect: Rect::new(info.x, info.y, size.w, size.h),
                    transform: info.transform,
                })
            });
        }

        for output in self.hardware.outputs.iter_mut() {
            output.crtc = assignment
                .crtcs
                .iter()
                .find(|info| info.outputs.contains(&output.id))
                .map(|info| info.crtc);
            let flags = assignment
                .outputs
                .iter()
                .find(|info| info.output == output.id);
            output.is_primary = flags.is_some_and(|flags| flags.is_primary);
            output.is_presentation = flags.is_some_and(|flags| flags.is_presentation);
            output.is_underscanning = flags.is_some_and(|flags| {
                flags.is_underscanning && output.supports_underscanning
            });
        }

        self.applied += 1;
        self.snapshot = self.hardware.clone();
        debug!(crtcs = assignment.crtcs.len(), "Applied configuration");
        Ok(())
    }

    fn read_current(&mut self) -> Result<()> {
        self.snapshot = self.hardware.clone();
        Ok(())
    }
}
