// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result};
use zbus::Connection;

#[zbus::proxy(
    interface = "org.freedesktop.UPower",
    default_service = "org.freedesktop.UPower",
    default_path = "/org/freedesktop/UPower"
)]
pub trait UPower {
    #[zbus(property)]
    fn lid_is_closed(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn lid_is_present(&self) -> zbus::Result<bool>;
}

pub async fn init() -> Result<UPowerProxy<'static>> {
    let conn = Connection::system()
        .await
        .context("Failed to connect to system D-Bus")?;
    let proxy = UPowerProxy::new(&conn)
        .await
        .context("Failed to create UPower proxy")?;
    Ok(proxy)
}
