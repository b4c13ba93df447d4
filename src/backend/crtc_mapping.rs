// SPDX-License-Identifier: GPL-3.0-only

use cosmic_monitors_config::{Configuration, OutputIntent};
use smithay::utils::{Physical, Size};
use thiserror::Error;
use tracing::trace;

use super::{Crtc, CrtcAssignment, CrtcInfo, Mode, Output, OutputInfo, Resources};
use crate::utils::geometry::TransformExt;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("Output {0} is not connected")]
    UnknownOutput(String),
    #[error("Could not assign CRTCs to outputs")]
    Unsatisfiable,
}

struct Request<'a> {
    output: &'a Output,
    intent: &'a OutputIntent,
}

/// Finds CRTCs and modes for every enabled output of `config`.
///
/// Outputs may share a CRTC only when they can all clone each other and ask
/// for the same mode, position and transform. The search is exhaustive, so a
/// failure means no assignment exists for this hardware.
pub fn assign_crtcs(
    config: &Configuration,
    resources: &Resources,
) -> Result<CrtcAssignment, SolveError> {
    let mut requests = Vec::new();
    let mut outputs = Vec::new();
    for (key, intent) in config.iter() {
        let output = resources.output_by_name(&key.connector);
        match output {
            Some(output) => outputs.push(OutputInfo {
                output: output.id,
                is_primary: intent.is_primary,
                is_presentation: intent.is_presentation,
                is_underscanning: intent.is_underscanning,
            }),
            None if intent.enabled => {
                return Err(SolveError::UnknownOutput(key.connector.clone()));
            }
            None => continue,
        }
        if let Some(output) = output.filter(|_| intent.enabled) {
            requests.push(Request { output, intent });
        }
    }

    let mut assignment =
        assign(&requests, resources, CrtcAssignment::default()).ok_or(SolveError::Unsatisfiable)?;
    assignment.outputs = outputs;
    Ok(assignment)
}

fn assign(
    requests: &[Request<'_>],
    resources: &Resources,
    assignment: CrtcAssignment,
) -> Option<CrtcAssignment> {
    let Some((request, rest)) = requests.split_first() else {
        return Some(assignment);
    };
    let intent = request.intent;

    for crtc in resources
        .crtcs
        .iter()
        .filter(|crtc| request.output.possible_crtcs.contains(&crtc.id))
        .filter(|crtc| crtc.transforms.supports(intent.transform))
    {
        // exact refresh rate first, then any rate
        for exact_rate in [true, false] {
            for mode in resources
                .modes
                .iter()
                .filter(|mode| request.output.modes.contains(&mode.id))
            {
                let size = intent
                    .transform
                    .to_smithay()
                    .transform_size(Size::<i32, Physical>::from((mode.width, mode.height)));
                if size.w != intent.rect.width || size.h != intent.rect.height {
                    continue;
                }
                if exact_rate && mode.refresh_rate != intent.refresh_rate {
                    continue;
                }

                trace!(
                    crtc = crtc.id,
                    output = %request.output.name,
                    "Trying mode {}x{}@{}",
                    mode.width,
                    mode.height,
                    mode.refresh_rate,
                );
                if let Some(extended) = try_assign(&assignment, crtc, mode, request, resources) {
                    if let Some(done) = assign(rest, resources, extended) {
                        return Some(done);
                    }
                }
            }
        }
    }

    None
}

fn try_assign(
    assignment: &CrtcAssignment,
    crtc: &Crtc,
    mode: &Mode,
    request: &Request<'_>,
    resources: &Resources,
) -> Option<CrtcAssignment> {
    let rect = request.intent.rect;
    let transform = request.intent.transform;
    let mut extended = assignment.clone();

    match extended.crtcs.iter_mut().find(|info| info.crtc == crtc.id) {
        Some(info) => {
            if info.mode != mode.id
                || info.x != rect.x
                || info.y != rect.y
                || info.transform != transform
            {
                return None;
            }
            let clonable = info.outputs.iter().all(|id| {
                resources.output(*id).is_some_and(|other| {
                    other.can_clone(request.output.id) && request.output.can_clone(*id)
                })
            });
            if !clonable {
                return None;
            }
            info.outputs.push(request.output.id);
        }
        None => extended.crtcs.push(CrtcInfo {
            crtc: crtc.id,
            mode: mode.id,
            x: rect.x,
            y: rect.y,
            transform,
            outputs: vec![request.output.id],
        }),
    }

    Some(extended)
}
