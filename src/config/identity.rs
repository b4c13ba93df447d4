// SPDX-License-Identifier: GPL-3.0-only

use cosmic_monitors_config::{OutputKey, Topology};

use crate::backend::{Output, Resources};

#[cfg(feature = "edid")]
fn edid_key(output: &Output) -> Option<OutputKey> {
    let blob = output.edid.as_deref()?;
    let info = libdisplay_info::info::Info::parse_edid(blob).ok()?;
    let edid = info.edid()?;
    Some(OutputKey::from_vendor_product(
        &output.name,
        edid.vendor_product(),
    ))
}

pub fn output_key(output: &Output) -> OutputKey {
    #[cfg(feature = "edid")]
    if let Some(key) = edid_key(output) {
        return key;
    }
    OutputKey::new(
        &output.name,
        &output.vendor,
        &output.product,
        &output.serial,
    )
}

/// Outputs in the order configurations list them.
pub fn sorted_outputs(resources: &Resources) -> Vec<&Output> {
    let mut outputs = resources.outputs.iter().collect::<Vec<_>>();
    outputs.sort_by(|a, b| a.name.cmp(&b.name));
    outputs
}

pub fn topology(resources: &Resources) -> Topology {
    sorted_outputs(resources)
        .into_iter()
        .map(output_key)
        .collect()
}
