//! Registry for the per-source registry reducers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::SourceKind;
use crate::ports::RegistryReducer;

/// A reducer plugged in for one registry schema.
pub struct SourcePlugin {
    /// Display name of the registry.
    pub name: String,
    /// Reducer folding the registry rows.
    pub reducer: Arc<dyn RegistryReducer>,
}

impl SourcePlugin {
    /// Registry schema handled by this plugin.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.reducer.kind()
    }
}

/// Registry that resolves reducers by source kind.
pub struct SourceRegistry {
    plugins: HashMap<SourceKind, SourcePlugin>,
}

impl SourceRegistry {
    /// Build a registry from the provided plugin list. A later plugin for the
    /// same kind replaces an earlier one.
    #[must_use]
    pub fn new(plugins: Vec<SourcePlugin>) -> Self {
        let plugins_map = plugins
            .into_iter()
            .map(|plugin| (plugin.kind(), plugin))
            .collect();
        Self {
            plugins: plugins_map,
        }
    }

    /// Registered source kinds in a stable order.
    #[must_use]
    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<SourceKind> = self.plugins.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Look up the plugin for a source kind.
    #[must_use]
    pub fn plugin(&self, kind: SourceKind) -> Option<&SourcePlugin> {
        self.plugins.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawRow;
    use crate::ports::Reduction;

    struct Fixed(SourceKind);

    impl RegistryReducer for Fixed {
        fn kind(&self) -> SourceKind {
            self.0
        }

        fn reduce(&self, rows: &[RawRow]) -> Reduction {
            Reduction {
                rows_seen: rows.len(),
                ..Reduction::default()
            }
        }
    }

    fn plugin(name: &str, kind: SourceKind) -> SourcePlugin {
        SourcePlugin {
            name: name.to_owned(),
            reducer: Arc::new(Fixed(kind)),
        }
    }

    #[test]
    fn kinds_are_sorted_and_later_plugins_win() {
        let registry = SourceRegistry::new(vec![
            plugin("mieszkancy", SourceKind::Residential),
            plugin("firmy", SourceKind::Commercial),
            plugin("firmy v2", SourceKind::Commercial),
        ]);

        assert_eq!(
            registry.kinds(),
            vec![SourceKind::Commercial, SourceKind::Residential]
        );
        assert_eq!(
            registry.plugin(SourceKind::Commercial).map(|found| found.name.as_str()),
            Some("firmy v2")
        );
    }

    #[test]
    fn empty_registry_has_no_plugins() {
        let registry = SourceRegistry::new(Vec::new());
        assert!(registry.kinds().is_empty());
        assert!(registry.plugin(SourceKind::Residential).is_none());
    }
}
