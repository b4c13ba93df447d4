// SPDX-License-Identifier: GPL-3.0-only

use std::rc::Rc;

use cosmic_monitors_config::{Configuration, Topology};
use indexmap::IndexMap;

/// Known configurations, one per topology, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct ConfigurationStore {
    configs: IndexMap<Topology, Rc<Configuration>>,
}

impl ConfigurationStore {
    pub fn new() -> ConfigurationStore {
        ConfigurationStore::default()
    }

    pub fn lookup(&self, topology: &Topology) -> Option<Rc<Configuration>> {
        self.configs.get(topology).cloned()
    }

    /// Stores `config`, replacing any configuration for the same topology.
    pub fn insert(&mut self, config: Rc<Configuration>) -> Option<Rc<Configuration>> {
        self.configs.insert(config.topology().clone(), config)
    }

    pub fn remove(&mut self, topology: &Topology) -> Option<Rc<Configuration>> {
        self.configs.shift_remove(topology)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Configuration>> {
        self.configs.values()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmic_monitors_config::{OutputIntent, OutputKey, Rect};

    fn key(connector: &str) -> OutputKey {
        OutputKey::new(connector, "GSM", "0x5b7f", "0x0001e2a0")
    }

    fn config(connectors: &[&str], x: i32) -> Configuration {
        Configuration::new(connectors.iter().map(|connector| {
            (
                key(connector),
                OutputIntent {
                    enabled: true,
                    rect: Rect::new(x, 0, 1920, 1080),
                    refresh_rate: 60.0,
                    ..Default::default()
                },
            )
        }))
    }

    #[test]
    fn lookup_is_exact() {
        let mut store = ConfigurationStore::new();
        let stored = Rc::new(config(&["DP-1", "DP-2"], 0));
        assert!(store.insert(stored.clone()).is_none());

        let found = store.lookup(stored.topology()).unwrap();
        assert!(Rc::ptr_eq(&found, &stored));

        for other in [
            Topology::new(vec![key("DP-1")]),
            Topology::new(vec![key("DP-2"), key("DP-1")]),
            Topology::new(vec![key("DP-1"), key("DP-2"), key("DP-3")]),
            Topology::new(vec![key("DP-1"), OutputKey::new("DP-2", "GSM", "0x5b7f", "")]),
        ] {
            assert!(store.lookup(&other).is_none());
        }
    }

    #[test]
    fn insert_replaces_same_topology() {
        let mut store = ConfigurationStore::new();
        store.insert(Rc::new(config(&["DP-1"], 0)));
        store.insert(Rc::new(config(&["HDMI-A-1"], 0)));
        let replaced = store.insert(Rc::new(config(&["DP-1"], 100))).unwrap();
        assert_eq!(replaced.outputs()[0].rect.x, 0);
        assert_eq!(store.len(), 2);

        let first = store.iter().next().unwrap();
        assert_eq!(first.keys()[0].connector, "DP-1");
        assert_eq!(first.outputs()[0].rect.x, 100);

        let topology = first.topology().clone();
        assert!(store.remove(&topology).is_some());
        assert_eq!(store.len(), 1);
    }
}
