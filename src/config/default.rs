// SPDX-License-Identifier: GPL-3.0-only

//! Layouts for topologies nobody configured yet.

use cosmic_monitors_config::{Configuration, OutputIntent, Rect};
use tracing::{debug, warn};

use super::{identity, store::ConfigurationStore};
use crate::{
    backend::{Output, Resources, ScreenLimits},
    utils::geometry::any_overlap,
};

/// The output that should be primary: the one already flagged, else a
/// built-in panel, else the one with the largest preferred mode. Outputs whose
/// preferred mode is not in the inventory are never picked.
pub fn find_primary_output(resources: &Resources, outputs: &[&Output]) -> Option<usize> {
    let usable = |output: &Output| resources.preferred_mode(output).is_some();
    if let Some(idx) = outputs
        .iter()
        .position(|output| output.is_primary && usable(*output))
    {
        return Some(idx);
    }
    if let Some(idx) = outputs
        .iter()
        .position(|output| output.is_builtin() && usable(*output))
    {
        return Some(idx);
    }

    let mut best = None;
    let mut best_area = 0;
    for (idx, output) in outputs.iter().enumerate() {
        if let Some(mode) = resources.preferred_mode(output) {
            let area = mode.width as i64 * mode.height as i64;
            if area > best_area {
                best = Some(idx);
                best_area = area;
            }
        }
    }
    best
}

/// Enabled at (0, 0) with the preferred mode, or disabled if that mode is
/// not in the inventory.
fn preferred_intent(resources: &Resources, output: &Output) -> OutputIntent {
    match resources.preferred_mode(output) {
        Some(mode) => OutputIntent {
            enabled: true,
            rect: Rect::new(0, 0, mode.width, mode.height),
            refresh_rate: mode.refresh_rate,
            ..Default::default()
        },
        None => {
            warn!(output = %output.name, "Preferred mode is unknown, disabling output");
            OutputIntent::disabled()
        }
    }
}

fn make_suggested(resources: &Resources, outputs: &[&Output]) -> Option<Vec<OutputIntent>> {
    let primary = find_primary_output(resources, outputs);
    let mut intents = Vec::with_capacity(outputs.len());
    for (idx, output) in outputs.iter().enumerate() {
        let (x, y) = output.suggested_position?;
        if x < 0 || y < 0 {
            return None;
        }
        let mut intent = preferred_intent(resources, output);
        if intent.enabled {
            intent.rect.x = x;
            intent.rect.y = y;
            intent.is_primary = primary == Some(idx);
        }
        intents.push(intent);
    }

    let rects = intents
        .iter()
        .filter(|intent| intent.enabled)
        .map(|intent| intent.rect)
        .collect::<Vec<_>>();
    if any_overlap(&rects) {
        warn!("Overlapping outputs, rejecting suggested configuration");
        return None;
    }
    Some(intents)
}

/// Reuses the stored layout of the topology without one output and adds it
/// to the right, or below, or disabled when neither fits.
fn extend_stored(
    resources: &Resources,
    outputs: &[&Output],
    limits: ScreenLimits,
    store: &ConfigurationStore,
) -> Option<Vec<OutputIntent>> {
    let topology = outputs
        .iter()
        .map(|output| identity::output_key(output))
        .collect::<cosmic_monitors_config::Topology>();

    for new in 0..outputs.len() {
        let Some(reference) = store.lookup(&topology.without(new)) else {
            continue;
        };
        debug!(output = %outputs[new].name, "Extending stored configuration");

        let mut intents = reference.outputs().to_vec();
        let (right, bottom) = intents
            .iter()
            .filter(|intent| intent.enabled)
            .fold((0, 0), |(right, bottom), intent| {
                (right.max(intent.rect.right()), bottom.max(intent.rect.bottom()))
            });

        let mut intent = preferred_intent(resources, outputs[new]);
        if right + intent.rect.width <= limits.max_width {
            intent.rect.x = right;
        } else if bottom + intent.rect.height <= limits.max_height {
            intent.rect.y = bottom;
        } else {
            intent = OutputIntent::disabled();
        }
        intents.insert(new, intent);
        return Some(intents);
    }

    None
}

struct Linear<'a> {
    resources: &'a Resources,
    outputs: &'a [&'a Output],
    intents: Vec<OutputIntent>,
    configured: Vec<bool>,
    x: i32,
}

impl Linear<'_> {
    fn untiled(&mut self, idx: usize, is_primary: bool) {
        if self.configured[idx] {
            return;
        }
        let mut intent = preferred_intent(self.resources, self.outputs[idx]);
        if intent.enabled {
            intent.rect.x = self.x;
            intent.is_primary = is_primary;
            self.x += intent.rect.width;
        }
        self.intents[idx] = intent;
        self.configured[idx] = true;
    }

    fn tiled_group(&mut self, base: usize, is_primary: bool) {
        if self.configured[base] {
            return;
        }
        let Some(base_tile) = self.outputs[base].tile else {
            return;
        };

        let outputs = self.outputs;
        let mut cur_x = self.x;
        for h_tile in 0..base_tile.max_h_tiles {
            let mut cur_y = 0;
            let mut add_x = 0;
            for v_tile in 0..base_tile.max_v_tiles {
                for (idx, output) in outputs.iter().enumerate() {
                    let Some(tile) = output.tile else {
                        continue;
                    };
                    if tile.group_id != base_tile.group_id
                        || tile.loc_h_tile != h_tile
                        || tile.loc_v_tile != v_tile
                    {
                        continue;
                    }

                    let mut intent = preferred_intent(self.resources, output);
                    if intent.enabled {
                        intent.rect.x = cur_x;
                        intent.rect.y = cur_y;
                        intent.is_primary = is_primary && h_tile == 0 && v_tile == 0;
                    }
                    self.intents[idx] = intent;
                    self.configured[idx] = true;

                    cur_y += tile.tile_h;
                    if v_tile == 0 {
                        add_x += tile.tile_w;
                    }
                }
            }
            cur_x += add_x;
        }
        self.x = cur_x;
    }
}

/// Left to right at preferred modes: primary first, then tiled monitors,
/// then everything else.
fn make_linear(resources: &Resources, outputs: &[&Output]) -> Vec<OutputIntent> {
    let mut linear = Linear {
        resources,
        outputs,
        intents: vec![OutputIntent::disabled(); outputs.len()],
        configured: vec![false; outputs.len()],
        x: 0,
    };

    if let Some(primary) = find_primary_output(resources, outputs) {
        if outputs[primary].tile.is_some() {
            linear.tiled_group(primary, true);
        } else {
            linear.untiled(primary, true);
        }
    }
    for idx in 0..outputs.len() {
        linear.tiled_group(idx, false);
    }
    for idx in 0..outputs.len() {
        linear.untiled(idx, false);
    }

    linear.intents
}

fn check_limits(intents: &mut [OutputIntent], limits: ScreenLimits) {
    for intent in intents.iter_mut().filter(|intent| intent.enabled) {
        if intent.rect.right() > limits.max_width || intent.rect.bottom() > limits.max_height {
            *intent = OutputIntent::disabled();
        }
    }
}

/// Enables only the preferred primary output at (0, 0), if at all possible.
fn single_primary(resources: &Resources, outputs: &[&Output]) -> Vec<OutputIntent> {
    let primary = find_primary_output(resources, outputs);
    outputs
        .iter()
        .enumerate()
        .map(|(idx, output)| {
            if Some(idx) == primary {
                let mut intent = preferred_intent(resources, output);
                intent.is_primary = intent.enabled;
                intent
            } else {
                OutputIntent::disabled()
            }
        })
        .collect()
}

fn build(outputs: &[&Output], intents: Vec<OutputIntent>) -> Configuration {
    Configuration::new(
        outputs
            .iter()
            .map(|output| identity::output_key(output))
            .zip(intents),
    )
}

/// Synthesizes a configuration for the live topology.
///
/// Stored layouts are only extended when `store` is given. Returns `None`
/// when no output is connected.
pub fn make_default(
    resources: &Resources,
    limits: ScreenLimits,
    store: Option<&ConfigurationStore>,
) -> Option<Configuration> {
    let outputs = identity::sorted_outputs(resources);
    if outputs.is_empty() {
        return None;
    }

    let mut intents = if outputs.len() == 1 {
        let mut intent = preferred_intent(resources, outputs[0]);
        intent.is_primary = intent.enabled;
        vec![intent]
    } else if let Some(intents) = make_suggested(resources, &outputs) {
        intents
    } else if let Some(intents) =
        store.and_then(|store| extend_stored(resources, &outputs, limits, store))
    {
        intents
    } else {
        make_linear(resources, &outputs)
    };

    check_limits(&mut intents, limits);
    if !intents.iter().any(|intent| intent.enabled) {
        intents = single_primary(resources, &outputs);
    }

    Some(build(&outputs, intents))
}

/// Configuration to fall back to when nothing could be applied.
pub fn recovery_configuration(resources: &Resources) -> Option<Configuration> {
    let outputs = identity::sorted_outputs(resources);
    if outputs.is_empty() {
        return None;
    }
    let intents = single_primary(resources, &outputs);
    Some(build(&outputs, intents))
}
