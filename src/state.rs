// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result};
use calloop::{
    channel::{Channel, Event},
    timer::{TimeoutAction, Timer},
    InsertError, LoopHandle, RegistrationToken,
};
use cosmic_monitors_config::Configuration;
use tracing::{error, info, warn};

use crate::{
    backend::dummy::DummyBackend,
    config::{ApplyError, MonitorConfig, SaveCompletion, CONFIRMATION_TIMEOUT},
};

pub struct State {
    pub backend: DummyBackend,
    pub monitors: MonitorConfig,
    pub loop_handle: LoopHandle<'static, State>,
    confirmation_timer: Option<RegistrationToken>,
}

impl State {
    pub fn new(
        backend: DummyBackend,
        monitors: MonitorConfig,
        loop_handle: LoopHandle<'static, State>,
    ) -> State {
        State {
            backend,
            monitors,
            loop_handle,
            confirmation_timer: None,
        }
    }

    /// Routes completions of the monitor config saver back into the engine.
    pub fn watch_saves(&self, channel: Channel<SaveCompletion>) -> Result<RegistrationToken> {
        self.loop_handle
            .insert_source(channel, |event, _, state| {
                if let Event::Msg(completion) = event {
                    state.monitors.save_completed(completion);
                }
            })
            .map_err(|InsertError { error, .. }| error)
            .with_context(|| "Failed to add save channel to event_loop")
    }

    pub fn set_lid_closed(&mut self, closed: bool) {
        self.monitors.set_lid_closed(&mut self.backend, closed);
    }

    pub fn hotplug(&mut self) {
        if let Err(err) = self.monitors.on_hotplug(&mut self.backend) {
            error!(?err, "Failed to read output state after hotplug");
        }
    }

    /// Applies a client request. Persistent ones get reverted unless
    /// [`State::confirm`] is called before [`CONFIRMATION_TIMEOUT`] runs out.
    pub fn apply_user_configuration(
        &mut self,
        config: Configuration,
        persistent: bool,
    ) -> Result<(), ApplyError> {
        self.disarm_confirmation();
        self.monitors
            .apply_user_configuration(&mut self.backend, config, persistent)?;
        if persistent {
            self.arm_confirmation();
        }
        Ok(())
    }

    pub fn confirm(&mut self, ok: bool) {
        self.disarm_confirmation();
        self.monitors.confirm_configuration(&mut self.backend, ok);
    }

    pub fn confirmation_pending(&self) -> bool {
        self.confirmation_timer.is_some()
    }

    fn arm_confirmation(&mut self) {
        let timer = Timer::from_duration(CONFIRMATION_TIMEOUT);
        match self.loop_handle.insert_source(timer, |_, _, state| {
            state.confirmation_timer = None;
            info!("Display change was not confirmed, reverting");
            state.monitors.confirm_configuration(&mut state.backend, false);
            TimeoutAction::Drop
        }) {
            Ok(token) => self.confirmation_timer = Some(token),
            Err(err) => {
                warn!(?err, "Failed to arm confirmation timer, reverting");
                self.monitors.confirm_configuration(&mut self.backend, false);
            }
        }
    }

    fn disarm_confirmation(&mut self) {
        if let Some(token) = self.confirmation_timer.take() {
            self.loop_handle.remove(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationStore;
    use calloop::EventLoop;
    use cosmic_monitors_config::OutputIntent;

    fn setup(event_loop: &EventLoop<'static, State>) -> State {
        let backend = DummyBackend::from_spec("eDP-1:1920x1080@60,DP-1:2560x1440@60").unwrap();
        let monitors = MonitorConfig::new(ConfigurationStore::new(), false);
        let mut state = State::new(backend, monitors, event_loop.handle());
        state.monitors.apply_initial(&mut state.backend);
        state
    }

    fn without_panel(config: &Configuration) -> Configuration {
        config.map_outputs(|_, key, mut intent| {
            if key.is_builtin() {
                intent = OutputIntent::disabled();
            } else {
                intent.rect.x = 0;
                intent.is_primary = true;
            }
            intent
        })
    }

    #[test]
    fn confirmation_disarms_timer() {
        let event_loop = EventLoop::try_new().unwrap();
        let mut state = setup(&event_loop);
        let requested = without_panel(state.monitors.current().unwrap());

        state
            .apply_user_configuration(requested.clone(), true)
            .unwrap();
        assert!(state.confirmation_pending());
        state.confirm(true);
        assert!(!state.confirmation_pending());
        assert!(state.monitors.current().unwrap().full_eq(&requested));
        assert_eq!(state.monitors.store().len(), 1);
    }

    #[test]
    fn temporary_change_needs_no_confirmation() {
        let event_loop = EventLoop::try_new().unwrap();
        let mut state = setup(&event_loop);
        let requested = without_panel(state.monitors.current().unwrap());

        state.apply_user_configuration(requested, false).unwrap();
        assert!(!state.confirmation_pending());
        assert!(!state.monitors.pending_confirmation());
    }

    #[test]
    fn lid_events_reach_the_engine() {
        let event_loop = EventLoop::try_new().unwrap();
        let mut state = setup(&event_loop);
        state.set_lid_closed(true);
        assert!(state.monitors.is_for_laptop_lid());
        state.set_lid_closed(false);
        assert_eq!(state.monitors.current().unwrap().enabled_count(), 2);

        state.backend.plug("HDMI-A-1", 1920, 1080, 60.0);
        state.hotplug();
        assert_eq!(state.monitors.current().unwrap().enabled_count(), 3);
    }
}
