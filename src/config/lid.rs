// SPDX-License-Identifier: GPL-3.0-only

use cosmic_monitors_config::{Configuration, OutputIntent, OutputKey};

pub fn is_laptop(key: &OutputKey) -> bool {
    key.is_builtin()
}

pub fn laptop_display_is_on(config: &Configuration) -> bool {
    config
        .iter()
        .any(|(key, intent)| is_laptop(key) && intent.enabled)
}

pub fn multiple_outputs_enabled(config: &Configuration) -> bool {
    config.enabled_count() > 1
}

/// Variant of `reference` with the laptop panel switched off.
///
/// Outputs placed right of or below the panel move back by its size. If the
/// primary output went away, the first enabled output takes over. Applying
/// this to its own result changes nothing.
pub fn make_lid_config(reference: &Configuration) -> Configuration {
    let mut after = (i32::MAX, i32::MAX);
    let mut offset = (0, 0);
    for (key, intent) in reference.iter() {
        if is_laptop(key) && intent.enabled {
            after = (intent.rect.x, intent.rect.y);
            offset = (intent.rect.width, intent.rect.height);
        }
    }

    let mut config = reference.map_outputs(|_, key, mut intent| {
        if is_laptop(key) {
            return OutputIntent::disabled();
        }
        if intent.enabled {
            if intent.rect.x > after.0 {
                intent.rect.x -= offset.0;
            }
            if intent.rect.y > after.1 {
                intent.rect.y -= offset.1;
            }
        }
        intent
    });

    let has_primary = config
        .outputs()
        .iter()
        .any(|intent| intent.enabled && intent.is_primary);
    if !has_primary {
        if let Some(first) = config.outputs().iter().position(|intent| intent.enabled) {
            config = config.map_outputs(|idx, _, mut intent| {
                if idx == first {
                    intent.is_primary = true;
                }
                intent
            });
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmic_monitors_config::Rect;

    fn intent(x: i32, y: i32, width: i32, height: i32, is_primary: bool) -> OutputIntent {
        OutputIntent {
            enabled: true,
            rect: Rect::new(x, y, width, height),
            refresh_rate: 60.0,
            is_primary,
            ..Default::default()
        }
    }

    fn docked() -> Configuration {
        Configuration::new([
            (
                OutputKey::new("DP-1", "DEL", "0xa0c4", "0x4c4b3953"),
                intent(1920, 0, 2560, 1440, false),
            ),
            (
                OutputKey::new("eDP-1", "BOE", "0x0a1b", ""),
                intent(0, 0, 1920, 1080, true),
            ),
        ])
    }

    #[test]
    fn panel_is_turned_off_and_rest_shifted() {
        let reference = docked();
        assert!(laptop_display_is_on(&reference));
        assert!(multiple_outputs_enabled(&reference));

        let closed = make_lid_config(&reference);
        assert_eq!(closed.topology(), reference.topology());
        assert!(!closed.outputs()[1].enabled);
        assert_eq!(closed.outputs()[0].rect, Rect::new(0, 0, 2560, 1440));
        assert!(closed.outputs()[0].is_primary);
        assert!(!laptop_display_is_on(&closed));
        assert!(!multiple_outputs_enabled(&closed));
    }

    #[test]
    fn idempotent() {
        let once = make_lid_config(&docked());
        let twice = make_lid_config(&once);
        assert!(once.full_eq(&twice));
    }

    #[test]
    fn outputs_before_the_panel_stay() {
        let reference = Configuration::new([
            (
                OutputKey::new("DP-1", "DEL", "0xa0c4", "0x1"),
                intent(0, 0, 1920, 1080, true),
            ),
            (
                OutputKey::new("DP-2", "DEL", "0xa0c4", "0x2"),
                intent(3840, 0, 1920, 1080, false),
            ),
            (
                OutputKey::new("eDP-1", "BOE", "0x0a1b", ""),
                intent(1920, 0, 1920, 1080, false),
            ),
        ]);
        let closed = make_lid_config(&reference);
        assert_eq!(closed.outputs()[0].rect.x, 0);
        assert_eq!(closed.outputs()[1].rect.x, 1920);
        assert!(closed.outputs()[0].is_primary);
        assert!(!closed.outputs()[1].is_primary);
    }
}
