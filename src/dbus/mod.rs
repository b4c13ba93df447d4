// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result};
use calloop::{InsertError, LoopHandle, RegistrationToken};
use futures_executor::{block_on, ThreadPool};
use futures_util::stream::StreamExt;
use tracing::{debug, info};

use crate::{state::State, utils::env};

pub mod upower;

pub const IGNORE_LID_VAR: &str = "COSMIC_MONITORS_IGNORE_LID";

pub fn lid_ignored() -> bool {
    env::flag(IGNORE_LID_VAR)
}

/// The lid state UPower reports right now, `None` without a lid.
pub fn lid_is_closed() -> Option<bool> {
    if lid_ignored() {
        return None;
    }
    let closed = block_on(async {
        let proxy = upower::init().await?;
        if !proxy.lid_is_present().await? {
            return Ok(None);
        }
        anyhow::Ok(Some(proxy.lid_is_closed().await?))
    });
    match closed {
        Ok(closed) => closed,
        Err(err) => {
            info!(?err, "Failed to query lid state from UPower");
            None
        }
    }
}

/// Forwards UPower lid changes into the event loop.
pub fn init(
    evlh: &LoopHandle<'static, State>,
    executor: &ThreadPool,
) -> Result<Vec<RegistrationToken>> {
    let mut tokens = Vec::new();
    if lid_ignored() {
        debug!("Ignoring lid switch");
        return Ok(tokens);
    }

    match block_on(upower::init()) {
        Ok(upower) => {
            let (tx, rx) = calloop::channel::channel::<bool>();

            let token = evlh
                .insert_source(rx, |event, _, state| match event {
                    calloop::channel::Event::Msg(closed) => state.set_lid_closed(closed),
                    calloop::channel::Event::Closed => (),
                })
                .map_err(|InsertError { error, .. }| error)
                .with_context(|| "Failed to add lid channel to event_loop")?;

            executor.spawn_ok(async move {
                let mut changes = upower.receive_lid_is_closed_changed().await;
                while let Some(change) = changes.next().await {
                    if let Ok(closed) = change.get().await {
                        if tx.send(closed).is_err() {
                            break;
                        }
                    }
                }
            });

            tokens.push(token);
        }
        Err(err) => {
            info!(?err, "Failed to connect to org.freedesktop.UPower");
        }
    };

    Ok(tokens)
}
