//! Project resolver: catalog cache, refresh policy, fuzzy matcher, and
//! project extraction from transcript content (spec §4.6).

pub mod fuzzy;

use crate::core::error::ResolverError;
use crate::core::types::ProjectCatalog;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use fuzzy::{extract_project, fuzzy_match, IGNORED_PROJECT_KEYWORDS};

/// Loads/saves the catalog cache and decides when a refresh is due
/// (spec §4.6 "Catalog cache" / "Refresh policy").
pub struct CatalogStore {
    cache_path: PathBuf,
    max_age_minutes: u64,
}

const HARD_CEILING_HOURS: i64 = 24;

impl CatalogStore {
    pub fn new(cache_path: impl Into<PathBuf>, max_age_minutes: u64) -> Self {
        Self { cache_path: cache_path.into(), max_age_minutes }
    }

    pub fn load(&self) -> ProjectCatalog {
        match std::fs::read_to_string(&self.cache_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => ProjectCatalog::default(),
        }
    }

    pub fn save(&self, catalog: &ProjectCatalog) -> Result<(), ResolverError> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent).map_err(ResolverError::Io)?;
        }
        let json = serde_json::to_string_pretty(catalog).map_err(ResolverError::Serialization)?;
        std::fs::write(&self.cache_path, json).map_err(ResolverError::Io)?;
        Ok(())
    }

    /// A refresh is due if the cache is empty, older than the hard 24h
    /// ceiling, or older than `max_age_minutes` (spec §4.6, Testable
    /// Property 7).
    pub fn needs_refresh(&self, catalog: &ProjectCatalog, now: DateTime<Utc>) -> bool {
        if catalog.is_empty() {
            return true;
        }
        let Some(last_fetch) = catalog.metadata.last_fetch else {
            return true;
        };
        let age = now - last_fetch;
        if age > chrono::Duration::hours(HARD_CEILING_HOURS) {
            return true;
        }
        age > chrono::Duration::minutes(self.max_age_minutes as i64)
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }
}

/// Source of a catalog used after a refresh attempt, for logging/metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    Fresh,
    StaleCache,
    Fallback,
}

/// Resolve the catalog to use this session: try a fresh refresh via
/// `refresh_fn`; on failure fall back to the most recent non-empty cached
/// contents, and finally to the hard-coded fallback list (spec §4.6).
pub fn resolve_catalog<E: std::fmt::Display>(
    cached: ProjectCatalog,
    refresh_fn: impl FnOnce() -> Result<ProjectCatalog, E>,
) -> (ProjectCatalog, CatalogSource) {
    match refresh_fn() {
        Ok(fresh) => {
            info!(total = fresh.metadata.total, "project catalog refreshed");
            (fresh, CatalogSource::Fresh)
        }
        Err(err) => {
            warn!(%err, "catalog refresh failed");
            if !cached.is_empty() {
                debug!("falling back to stale cached catalog");
                (cached, CatalogSource::StaleCache)
            } else {
                debug!("cache empty, falling back to hard-coded project list");
                (ProjectCatalog::fallback(), CatalogSource::Fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CatalogMetadata;

    fn catalog_with_age(age: chrono::Duration) -> ProjectCatalog {
        let mut catalog = ProjectCatalog::default();
        catalog.projects.insert(
            "Demo".to_string(),
            crate::core::types::ProjectData {
                name: "Demo".to_string(),
                store_id: "1".to_string(),
                aliases: vec![],
                status: "In progress".to_string(),
                archived: false,
            },
        );
        catalog.metadata = CatalogMetadata { last_fetch: Some(Utc::now() - age), ..Default::default() };
        catalog
    }

    #[test]
    fn test_empty_cache_needs_refresh() {
        let store = CatalogStore::new("/tmp/doesnotmatter.json", 60);
        assert!(store.needs_refresh(&ProjectCatalog::default(), Utc::now()));
    }

    #[test]
    fn test_stale_past_hard_ceiling_needs_refresh_regardless_of_max_age() {
        let store = CatalogStore::new("/tmp/doesnotmatter.json", 600);
        let catalog = catalog_with_age(chrono::Duration::hours(25));
        assert!(store.needs_refresh(&catalog, Utc::now()));
    }

    #[test]
    fn test_fresh_cache_does_not_need_refresh() {
        let store = CatalogStore::new("/tmp/doesnotmatter.json", 60);
        let catalog = catalog_with_age(chrono::Duration::minutes(5));
        assert!(!store.needs_refresh(&catalog, Utc::now()));
    }

    #[test]
    fn test_resolve_catalog_falls_back_to_stale_cache() {
        let cached = catalog_with_age(chrono::Duration::hours(30));
        let (resolved, source) = resolve_catalog(cached, || Err::<ProjectCatalog, _>("network down"));
        assert_eq!(source, CatalogSource::StaleCache);
        assert!(resolved.projects.contains_key("Demo"));
    }

    #[test]
    fn test_resolve_catalog_falls_back_to_hardcoded_list_when_cache_empty() {
        let (resolved, source) = resolve_catalog(ProjectCatalog::default(), || Err::<ProjectCatalog, _>("down"));
        assert_eq!(source, CatalogSource::Fallback);
        assert!(resolved.projects.contains_key("Life Admin HQ"));
    }

    #[test]
    fn test_catalog_store_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("projects.json"), 60);
        let catalog = catalog_with_age(chrono::Duration::minutes(1));
        store.save(&catalog).unwrap();
        let loaded = store.load();
        assert!(loaded.projects.contains_key("Demo"));
    }
}
