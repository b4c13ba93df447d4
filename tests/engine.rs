// SPDX-License-Identifier: GPL-3.0-only

use std::{
    cell::RefCell,
    fs,
    path::PathBuf,
    rc::Rc,
    time::{Duration, Instant},
};

use calloop::EventLoop;
use cosmic_monitors::{
    backend::{dummy::DummyBackend, Backend},
    config::{ConfigFiles, ConfigurationStore, MonitorConfig, MonitorsObserver, Saver},
    state::State,
};
use cosmic_monitors_config::{Configuration, OutputIntent, Rect};

const DOCKED: &str = "eDP-1:1920x1080@60,DP-1:2560x1440@60";

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "cosmic-monitors-engine-{}-{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn intent<'a>(config: &'a Configuration, connector: &str) -> &'a OutputIntent {
    config
        .iter()
        .find(|(key, _)| key.connector == connector)
        .map(|(_, intent)| intent)
        .unwrap()
}

/// External monitor on the left, panel to its right.
fn external_first(config: &Configuration) -> Configuration {
    config.map_outputs(|_, key, mut intent| {
        if key.is_builtin() {
            intent.rect.x = 2560;
            intent.is_primary = false;
        } else {
            intent.rect.x = 0;
            intent.is_primary = true;
        }
        intent
    })
}

struct Changes(Rc<RefCell<Vec<Configuration>>>);

impl MonitorsObserver for Changes {
    fn monitors_changed(&mut self, current: &Configuration) {
        self.0.borrow_mut().push(current.clone());
    }
}

#[test]
fn closing_and_opening_the_lid_restores_the_layout() {
    let mut backend = DummyBackend::from_spec(DOCKED).unwrap();
    let mut monitors = MonitorConfig::new(ConfigurationStore::new(), false);
    let changes = Rc::new(RefCell::new(Vec::new()));
    monitors.add_observer(Box::new(Changes(changes.clone())));

    monitors.apply_initial(&mut backend);
    let docked = monitors.current().unwrap().clone();
    assert_eq!(intent(&docked, "eDP-1").rect, Rect::new(0, 0, 1920, 1080));
    assert_eq!(intent(&docked, "DP-1").rect, Rect::new(1920, 0, 2560, 1440));

    monitors.set_lid_closed(&mut backend, true);
    let closed = monitors.current().unwrap().clone();
    assert!(!intent(&closed, "eDP-1").enabled);
    assert_eq!(intent(&closed, "DP-1").rect, Rect::new(0, 0, 2560, 1440));
    let dp = backend.resources().output_by_name("DP-1").unwrap();
    let crtc = backend.resources().crtc(dp.crtc.unwrap()).unwrap();
    assert_eq!(crtc.current.unwrap().rect, Rect::new(0, 0, 2560, 1440));

    monitors.set_lid_closed(&mut backend, false);
    assert!(monitors.current().unwrap().full_eq(&docked));

    let changes = changes.borrow();
    assert_eq!(changes.len(), 3);
    assert!(changes[1].full_eq(&closed));
}

#[test]
fn hotplug_extends_the_stored_layout() {
    let event_loop = EventLoop::try_new().unwrap();
    let backend = DummyBackend::from_spec(DOCKED).unwrap();
    let monitors = MonitorConfig::new(ConfigurationStore::new(), false);
    let mut state = State::new(backend, monitors, event_loop.handle());
    state.monitors.apply_initial(&mut state.backend);

    let layout = external_first(state.monitors.current().unwrap());
    state.apply_user_configuration(layout, true).unwrap();
    state.confirm(true);

    state.backend.plug("HDMI-A-1", 1920, 1080, 60.0);
    state.hotplug();
    let current = state.monitors.current().unwrap();
    assert_eq!(current.len(), 3);
    assert_eq!(intent(current, "DP-1").rect, Rect::new(0, 0, 2560, 1440));
    assert_eq!(intent(current, "eDP-1").rect, Rect::new(2560, 0, 1920, 1080));
    assert_eq!(intent(current, "HDMI-A-1").rect, Rect::new(4480, 0, 1920, 1080));
    assert!(intent(current, "DP-1").is_primary);

    // back to the stored two output layout
    state.backend.unplug("HDMI-A-1");
    state.hotplug();
    let current = state.monitors.current().unwrap();
    assert_eq!(intent(current, "eDP-1").rect.x, 2560);
}

#[test]
fn unconfirmed_change_is_reverted() {
    let event_loop = EventLoop::try_new().unwrap();
    let backend = DummyBackend::from_spec(DOCKED).unwrap();
    let monitors = MonitorConfig::new(ConfigurationStore::new(), false);
    let mut state = State::new(backend, monitors, event_loop.handle());
    state.monitors.apply_initial(&mut state.backend);
    let before = state.monitors.current().unwrap().clone();

    let layout = external_first(&before);
    state.apply_user_configuration(layout.clone(), true).unwrap();
    assert!(state.monitors.current().unwrap().full_eq(&layout));
    state.confirm(false);
    assert!(state.monitors.current().unwrap().full_eq(&before));
    assert!(state.monitors.store().is_empty());
}

#[test]
fn an_output_stays_lit_when_nothing_else_works() {
    let mut backend = DummyBackend::from_spec("DP-1:2560x1440@60,eDP-1:1920x1080@60").unwrap();
    // the only CRTC that can drive the panel
    let panel_crtc = backend.resources().crtcs[0].id;
    for output in backend.hardware_mut().outputs.iter_mut() {
        if output.name == "eDP-1" {
            output.possible_crtcs = vec![panel_crtc];
        } else {
            output.possible_crtcs.retain(|crtc| *crtc == panel_crtc);
        }
    }
    backend.read_current().unwrap();
    assert!(!backend.resources().any_output_active());

    let mut monitors = MonitorConfig::new(ConfigurationStore::new(), false);
    monitors.apply_initial(&mut backend);
    let current = monitors.current().unwrap();
    assert_eq!(current.enabled_count(), 1);
    assert!(intent(current, "eDP-1").enabled);
    assert!(backend.resources().any_output_active());
}

#[test]
fn persisted_layout_survives_a_restart() {
    let dir = temp_dir("restart");
    let files = ConfigFiles::in_dir(&dir);
    let path = files.user.clone().unwrap();

    let mut event_loop: EventLoop<'static, State> = EventLoop::try_new().unwrap();
    let mut monitors = MonitorConfig::load(&files, false);
    assert!(monitors.store().is_empty());
    let (saver, channel) = Saver::new(path.clone()).unwrap();
    monitors.set_saver(saver);

    let backend = DummyBackend::from_spec(DOCKED).unwrap();
    let mut state = State::new(backend, monitors, event_loop.handle());
    state.watch_saves(channel).unwrap();
    state.monitors.apply_initial(&mut state.backend);
    let layout = external_first(state.monitors.current().unwrap());
    state.apply_user_configuration(layout.clone(), true).unwrap();
    state.confirm(true);
    assert!(state.monitors.is_saving());

    let deadline = Instant::now() + Duration::from_secs(10);
    while state.monitors.is_saving() && Instant::now() < deadline {
        event_loop
            .dispatch(Some(Duration::from_millis(50)), &mut state)
            .unwrap();
    }
    assert!(!state.monitors.is_saving());
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("<monitors version=\"1\">"));

    let mut backend = DummyBackend::from_spec(DOCKED).unwrap();
    let mut monitors = MonitorConfig::load(&files, false);
    assert_eq!(monitors.store().len(), 1);
    monitors.apply_initial(&mut backend);
    assert!(monitors.current().unwrap().full_eq(&layout));
}

#[test]
fn lid_closed_at_boot_with_stored_layout() {
    let mut monitors = MonitorConfig::new(ConfigurationStore::new(), false);
    let mut backend = DummyBackend::from_spec(DOCKED).unwrap();
    monitors.apply_initial(&mut backend);
    let layout = external_first(monitors.current().unwrap());
    monitors
        .apply_user_configuration(&mut backend, layout.clone(), true)
        .unwrap();
    monitors.confirm_configuration(&mut backend, true);
    let store = monitors.store().clone();

    let mut backend = DummyBackend::from_spec(DOCKED).unwrap();
    let mut monitors = MonitorConfig::new(store, true);
    monitors.apply_initial(&mut backend);
    let current = monitors.current().unwrap();
    assert!(monitors.is_for_laptop_lid());
    assert!(!intent(current, "eDP-1").enabled);
    // the panel was right of the monitor, nothing moves
    assert_eq!(intent(current, "DP-1").rect, Rect::new(0, 0, 2560, 1440));
    assert!(intent(current, "DP-1").is_primary);
}
