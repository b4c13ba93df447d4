// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

pub mod output;
pub mod transform;

pub use self::output::{OutputIntent, OutputKey, Rect, UNKNOWN};
pub use self::transform::{Rotation, Transform};

/// The ordered set of outputs a configuration was made for.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Topology(Vec<OutputKey>);

impl Topology {
    pub fn new(keys: Vec<OutputKey>) -> Topology {
        Topology(keys)
    }

    pub fn keys(&self) -> &[OutputKey] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The same topology with the output at `idx` unplugged.
    pub fn without(&self, idx: usize) -> Topology {
        Topology(
            self.0
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, key)| key.clone())
                .collect(),
        )
    }
}

impl FromIterator<OutputKey> for Topology {
    fn from_iter<I: IntoIterator<Item = OutputKey>>(iter: I) -> Self {
        Topology(iter.into_iter().collect())
    }
}

/// A complete intended layout for one exact topology.
///
/// Keys and intents are co-indexed. Identity (and therefore storage) is
/// defined by the topology alone; use [`Configuration::full_eq`] to detect
/// layout changes.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Configuration {
    topology: Topology,
    outputs: Vec<OutputIntent>,
}

impl Configuration {
    pub fn new(entries: impl IntoIterator<Item = (OutputKey, OutputIntent)>) -> Configuration {
        let (keys, outputs): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .map(|(key, intent)| (key, intent.canonical()))
            .unzip();
        Configuration {
            topology: Topology(keys),
            outputs,
        }
    }

    /// Builds a configuration from separate key and intent lists, `None` if
    /// their lengths differ.
    pub fn from_parts(topology: Topology, outputs: Vec<OutputIntent>) -> Option<Configuration> {
        if topology.len() != outputs.len() {
            return None;
        }
        Some(Configuration::new(topology.0.into_iter().zip(outputs)))
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn keys(&self) -> &[OutputKey] {
        self.topology.keys()
    }

    pub fn outputs(&self) -> &[OutputIntent] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutputKey, &OutputIntent)> {
        self.topology.keys().iter().zip(self.outputs.iter())
    }

    pub fn enabled_count(&self) -> usize {
        self.outputs.iter().filter(|output| output.enabled).count()
    }

    /// Copy of this configuration with every intent passed through `f`.
    pub fn map_outputs(
        &self,
        mut f: impl FnMut(usize, &OutputKey, OutputIntent) -> OutputIntent,
    ) -> Configuration {
        Configuration::new(
            self.iter()
                .enumerate()
                .map(|(i, (key, intent))| (key.clone(), f(i, key, *intent))),
        )
    }

    /// Keys and intents both equal.
    pub fn full_eq(&self, other: &Configuration) -> bool {
        self.topology == other.topology && self.outputs == other.outputs
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.topology == other.topology
    }
}

impl Eq for Configuration {}

impl std::hash::Hash for Configuration {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.topology.hash(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(connector: &str) -> OutputKey {
        OutputKey::new(connector, "DEL", "0x4142", "0x00000001")
    }

    fn enabled(x: i32) -> OutputIntent {
        OutputIntent {
            enabled: true,
            rect: Rect::new(x, 0, 1920, 1080),
            refresh_rate: 60.0,
            ..Default::default()
        }
    }

    #[test]
    fn identity_ignores_intents() {
        let one = Configuration::new([(key("DP-1"), enabled(0)), (key("DP-2"), enabled(1920))]);
        let two = Configuration::new([(key("DP-1"), enabled(1920)), (key("DP-2"), enabled(0))]);
        assert_eq!(one, two);
        assert!(!one.full_eq(&two));
        assert!(one.full_eq(&one.clone()));
    }

    #[test]
    fn without_keeps_order() {
        let topology = Topology::new(vec![key("DP-1"), key("DP-2"), key("HDMI-A-1")]);
        let reduced = topology.without(1);
        assert_eq!(reduced.keys(), &[key("DP-1"), key("HDMI-A-1")]);
        assert_eq!(topology.without(5), topology);
    }

    #[test]
    fn from_parts_checks_lengths() {
        let topology = Topology::new(vec![key("DP-1")]);
        assert!(Configuration::from_parts(topology.clone(), Vec::new()).is_none());
        let config = Configuration::from_parts(topology, vec![enabled(0)]).unwrap();
        assert_eq!(config.enabled_count(), 1);
    }
}
