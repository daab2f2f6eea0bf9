//! Per-category cache policies.
//!
//! Policies are static: the table is built once from configuration and never
//! mutated while the agent runs.

use serde::{Deserialize, Serialize};

use crate::classify::Category;
use crate::config::AppConfig;

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Serve from cache; go to the network on miss or expiry.
    CacheFirst,
    /// Serve from the network; fall back to cache when it fails.
    NetworkFirst,
}

/// Cache policy for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub cache: String,
    pub strategy: Strategy,
    pub max_entries: Option<usize>,
    pub max_age: Option<chrono::Duration>,
}

impl Policy {
    fn unbounded(cache: String, strategy: Strategy) -> Self {
        Self { cache, strategy, max_entries: None, max_age: None }
    }
}

/// Policy lookup by category.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    app_shell: Policy,
    built_in_image: Policy,
    user_added_image: Policy,
    static_asset: Policy,
    other: Policy,
}

impl PolicyTable {
    /// Build the table for a configuration.
    ///
    /// Every category is cache-first unless `legacy_network_first` routes
    /// uncategorised requests network-first. Only the two image caches are
    /// bounded and age-limited.
    pub fn from_config(config: &AppConfig) -> Self {
        let names = config.cache_names();
        let max_age = Some(config.image_max_age());
        let other_strategy = if config.legacy_network_first { Strategy::NetworkFirst } else { Strategy::CacheFirst };

        Self {
            app_shell: Policy::unbounded(names.shell(), Strategy::CacheFirst),
            built_in_image: Policy {
                cache: names.images(),
                strategy: Strategy::CacheFirst,
                max_entries: Some(config.built_in_image_max_entries),
                max_age,
            },
            user_added_image: Policy {
                cache: names.user_images(),
                strategy: Strategy::CacheFirst,
                max_entries: Some(config.user_image_max_entries),
                max_age,
            },
            static_asset: Policy::unbounded(names.assets(), Strategy::CacheFirst),
            other: Policy::unbounded(names.precache(), other_strategy),
        }
    }

    /// The table `config` yields under an earlier cache `version`, used to
    /// keep serving that version's containers.
    pub fn for_version(config: &AppConfig, version: &str) -> Self {
        Self::from_config(&AppConfig { cache_version: version.to_string(), ..config.clone() })
    }

    pub fn for_category(&self, category: Category) -> &Policy {
        match category {
            Category::AppShell => &self.app_shell,
            Category::BuiltInImage => &self.built_in_image,
            Category::UserAddedImage => &self.user_added_image,
            Category::StaticAsset => &self.static_asset,
            Category::Other => &self.other,
        }
    }

    /// The policy whose container is `cache`, if any.
    pub fn for_cache(&self, cache: &str) -> Option<&Policy> {
        Category::ALL
            .iter()
            .map(|c| self.for_category(*c))
            .find(|p| p.cache == cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_limits() {
        let table = PolicyTable::from_config(&AppConfig::default());

        let images = table.for_category(Category::BuiltInImage);
        assert_eq!(images.cache, "pictoh-images-v1");
        assert_eq!(images.max_entries, Some(200));
        assert_eq!(images.max_age, Some(chrono::Duration::days(30)));

        let user = table.for_category(Category::UserAddedImage);
        assert_eq!(user.cache, "pictoh-user-images-v1");
        assert_eq!(user.max_entries, Some(50));

        for category in [Category::AppShell, Category::StaticAsset, Category::Other] {
            let policy = table.for_category(category);
            assert_eq!(policy.max_entries, None, "{category}");
            assert_eq!(policy.max_age, None, "{category}");
        }
    }

    #[test]
    fn test_cache_first_everywhere_by_default() {
        let table = PolicyTable::from_config(&AppConfig::default());
        for category in Category::ALL {
            assert_eq!(table.for_category(category).strategy, Strategy::CacheFirst, "{category}");
        }
    }

    #[test]
    fn test_legacy_network_first_for_other() {
        let config = AppConfig { legacy_network_first: true, ..Default::default() };
        let table = PolicyTable::from_config(&config);
        assert_eq!(table.for_category(Category::Other).strategy, Strategy::NetworkFirst);
        assert_eq!(table.for_category(Category::Other).cache, "pictoh-v1");
        assert_eq!(table.for_category(Category::BuiltInImage).strategy, Strategy::CacheFirst);
    }

    #[test]
    fn test_for_cache() {
        let config = AppConfig { user_image_max_entries: 12, ..AppConfig::default() };
        let table = PolicyTable::for_version(&config, "v2");
        assert_eq!(table.for_cache("pictoh-images-v2").and_then(|p| p.max_entries), Some(200));
        assert_eq!(table.for_cache("pictoh-user-images-v2").and_then(|p| p.max_entries), Some(12));
        assert!(table.for_cache("pictoh-user-images-v1").is_none());
    }
}
