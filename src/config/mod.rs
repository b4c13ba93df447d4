// SPDX-License-Identifier: GPL-3.0-only

use std::{rc::Rc, time::Duration};

use cosmic_monitors_config::{Configuration, OutputIntent};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::{
    crtc_mapping::{assign_crtcs, SolveError},
    Backend, Resources,
};

pub mod default;
pub mod identity;
pub mod lid;
pub mod persist;
pub mod store;
pub mod xml;

pub use self::persist::{ConfigFiles, SaveCompletion, SaveError, Saver};
pub use self::store::ConfigurationStore;

/// How long a client has to confirm a persistent configuration change.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub trait MonitorsObserver {
    /// Called after every successful apply.
    fn monitors_changed(&mut self, current: &Configuration);
    /// A persistent change was applied and waits for confirmation.
    fn confirm_display_change(&mut self) {}
}

/// Engine deciding which configuration is live.
pub struct MonitorConfig {
    store: ConfigurationStore,
    current: Option<Rc<Configuration>>,
    previous: Option<Rc<Configuration>>,
    current_is_for_laptop_lid: bool,
    lid_is_closed: bool,
    pending_confirmation: bool,
    saver: Option<Saver>,
    observers: Vec<Box<dyn MonitorsObserver>>,
}

impl MonitorConfig {
    pub fn new(store: ConfigurationStore, lid_is_closed: bool) -> MonitorConfig {
        MonitorConfig {
            store,
            current: None,
            previous: None,
            current_is_for_laptop_lid: false,
            lid_is_closed,
            pending_confirmation: false,
            saver: None,
            observers: Vec::new(),
        }
    }

    pub fn load(files: &ConfigFiles, lid_is_closed: bool) -> MonitorConfig {
        MonitorConfig::new(files.load(), lid_is_closed)
    }

    pub fn set_saver(&mut self, saver: Saver) {
        self.saver = Some(saver);
    }

    pub fn add_observer(&mut self, observer: Box<dyn MonitorsObserver>) {
        self.observers.push(observer);
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }

    pub fn current(&self) -> Option<&Rc<Configuration>> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&Rc<Configuration>> {
        self.previous.as_ref()
    }

    pub fn lid_is_closed(&self) -> bool {
        self.lid_is_closed
    }

    pub fn is_for_laptop_lid(&self) -> bool {
        self.current_is_for_laptop_lid
    }

    pub fn pending_confirmation(&self) -> bool {
        self.pending_confirmation
    }

    pub fn is_saving(&self) -> bool {
        self.saver.as_ref().is_some_and(Saver::is_saving)
    }

    pub fn get_stored(&self, backend: &impl Backend) -> Option<Rc<Configuration>> {
        let topology = identity::topology(backend.resources());
        if topology.is_empty() {
            return None;
        }
        self.store.lookup(&topology)
    }

    /// Whether the current configuration was made for the connected outputs.
    pub fn match_current(&self, backend: &impl Backend) -> bool {
        self.current.as_ref().is_some_and(|current| {
            *current.topology() == identity::topology(backend.resources())
        })
    }

    fn set_current(&mut self, config: Rc<Configuration>) {
        if let Some(old) = self.current.take() {
            if !old.full_eq(&config) {
                self.previous = Some(old);
            }
        }
        self.current = Some(config);
    }

    fn notify(&mut self) {
        if let Some(current) = self.current.clone() {
            for observer in self.observers.iter_mut() {
                observer.monitors_changed(&current);
            }
        }
    }

    fn apply(
        &mut self,
        backend: &mut impl Backend,
        config: Rc<Configuration>,
    ) -> Result<(), ApplyError> {
        let assignment = assign_crtcs(&config, backend.resources())?;
        backend.apply_configuration(&assignment)?;
        self.set_current(config);
        self.current_is_for_laptop_lid = false;
        self.notify();
        Ok(())
    }

    fn apply_with_lid(
        &mut self,
        backend: &mut impl Backend,
        config: Rc<Configuration>,
    ) -> Result<(), ApplyError> {
        if self.lid_is_closed
            && lid::multiple_outputs_enabled(&config)
            && lid::laptop_display_is_on(&config)
        {
            let lid_config = Rc::new(lid::make_lid_config(&config));
            self.apply(backend, lid_config)?;
            self.current_is_for_laptop_lid = true;
            Ok(())
        } else {
            self.apply(backend, config)
        }
    }

    /// Applies the stored configuration for the connected outputs, if any.
    pub fn apply_stored(&mut self, backend: &mut impl Backend) -> bool {
        let Some(stored) = self.get_stored(backend) else {
            return false;
        };
        match self.apply_with_lid(backend, stored) {
            Ok(()) => true,
            Err(err) => {
                warn!(?err, "Failed to apply stored configuration");
                false
            }
        }
    }

    /// Synthesizes and applies a configuration, leaving at least one output
    /// lit if that fails.
    pub fn make_default(&mut self, backend: &mut impl Backend) {
        let resources = backend.resources();
        if resources.outputs.is_empty() {
            debug!("No output connected, not applying configuration");
            return;
        }

        let store = (!resources.has_hotplug_mode_update()).then_some(&self.store);
        let config = default::make_default(resources, backend.screen_limits(), store);
        let result = match config {
            Some(config) => self.apply_with_lid(backend, Rc::new(config)),
            None => return,
        };

        if let Err(err) = result {
            warn!(
                ?err,
                "Could not make default configuration for current output layout"
            );
            if self.ensure_at_least_one_output(backend) {
                self.update_current(backend);
            }
        }
    }

    /// Returns `true` if some output was still active.
    fn ensure_at_least_one_output(&mut self, backend: &mut impl Backend) -> bool {
        if backend.resources().any_output_active() {
            return true;
        }

        let Some(config) = default::recovery_configuration(backend.resources()) else {
            return false;
        };
        if let Err(err) = self.apply(backend, Rc::new(config)) {
            error!(?err, "Failed to apply recovery configuration");
        }
        false
    }

    /// Startup: the stored configuration, or a synthesized one.
    pub fn apply_initial(&mut self, backend: &mut impl Backend) {
        if !self.apply_stored(backend) {
            self.make_default(backend);
        }
    }

    /// Re-reads the hardware and picks a configuration for the new topology.
    pub fn on_hotplug(&mut self, backend: &mut impl Backend) -> anyhow::Result<()> {
        backend.read_current()?;
        if self.match_current(backend) {
            debug!("Hotplug did not change the topology");
            return Ok(());
        }
        info!(
            outputs = backend.resources().outputs.len(),
            "Output topology changed"
        );
        self.apply_initial(backend);
        Ok(())
    }

    /// Makes the live hardware state the current configuration.
    pub fn update_current(&mut self, backend: &impl Backend) {
        let snapshot = Rc::new(snapshot(backend.resources()));
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.full_eq(&snapshot))
        {
            return;
        }
        self.set_current(snapshot);
    }

    pub fn restore_previous(&mut self, backend: &mut impl Backend) {
        if let Some(previous) = self.previous.take() {
            if *previous.topology() != identity::topology(backend.resources()) {
                debug!("Previous configuration is for other outputs, not restoring it");
            } else {
                let result = self.apply(backend, previous);
                // the configuration being left behind is not restorable
                self.previous = None;
                match result {
                    Ok(()) => return,
                    Err(err) => warn!(?err, "Failed to restore previous configuration"),
                }
            }
        }
        self.apply_initial(backend);
    }

    fn turn_off_laptop_display(&mut self, backend: &mut impl Backend) {
        let Some(current) = self.current.clone() else {
            return;
        };
        if !lid::multiple_outputs_enabled(&current) || !lid::laptop_display_is_on(&current) {
            return;
        }

        let config = Rc::new(lid::make_lid_config(&current));
        match self.apply(backend, config) {
            Ok(()) => self.current_is_for_laptop_lid = true,
            Err(err) => warn!(?err, "Failed to turn off laptop display"),
        }
    }

    pub fn set_lid_closed(&mut self, backend: &mut impl Backend, closed: bool) {
        if closed == self.lid_is_closed {
            return;
        }
        self.lid_is_closed = closed;
        info!(closed, "Lid state changed");

        if closed {
            self.turn_off_laptop_display(backend);
        } else if self.current_is_for_laptop_lid {
            self.restore_previous(backend);
        }
    }

    /// Applies a configuration requested by a client. Persistent changes need
    /// a [`Self::confirm_configuration`] within [`CONFIRMATION_TIMEOUT`].
    pub fn apply_user_configuration(
        &mut self,
        backend: &mut impl Backend,
        config: Configuration,
        persistent: bool,
    ) -> Result<(), ApplyError> {
        self.apply(backend, Rc::new(config))?;
        self.pending_confirmation = persistent;
        if persistent {
            for observer in self.observers.iter_mut() {
                observer.confirm_display_change();
            }
        }
        Ok(())
    }

    pub fn confirm_configuration(&mut self, backend: &mut impl Backend, ok: bool) {
        if !self.pending_confirmation {
            debug!("No configuration waiting for confirmation");
            return;
        }
        self.pending_confirmation = false;

        if ok {
            self.make_persistent();
        } else {
            self.restore_previous(backend);
        }
    }

    /// Stores the current configuration and writes the store to disk.
    pub fn make_persistent(&mut self) {
        let Some(current) = self.current.clone() else {
            return;
        };
        self.store.insert(current);
        self.save();
    }

    fn save(&mut self) {
        let Some(saver) = self.saver.as_mut() else {
            debug!("No configuration file, not saving");
            return;
        };
        saver.save(xml::serialize(&self.store));
    }

    pub fn save_completed(&mut self, completion: SaveCompletion) {
        let Some(saver) = self.saver.as_mut() else {
            return;
        };
        match saver.completed(completion) {
            Some(Ok(())) => debug!("Saved monitor configuration to {}", saver.path().display()),
            Some(Err(SaveError::Cancelled)) | None => {}
            Some(Err(err)) => warn!(?err, "Saving monitor configuration failed"),
        }
    }
}

/// The live hardware state as a configuration.
pub fn snapshot(resources: &Resources) -> Configuration {
    Configuration::new(identity::sorted_outputs(resources).into_iter().map(|output| {
        let state = output
            .crtc
            .and_then(|id| resources.crtc(id))
            .and_then(|crtc| crtc.current);
        let intent = match state {
            Some(state) => OutputIntent {
                enabled: true,
                rect: state.rect,
                refresh_rate: resources
                    .mode(state.mode)
                    .map_or(0.0, |mode| mode.refresh_rate),
                transform: state.transform,
                is_primary: output.is_primary,
                is_presentation: output.is_presentation,
                is_underscanning: output.is_underscanning,
            },
            None => OutputIntent::disabled(),
        };
        (identity::output_key(output), intent)
    }))
}
