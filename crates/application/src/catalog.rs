//! Embedded app and category catalog.
//!
//! Maps each blockable app to its domain suffixes (for the suffix fast
//! path) and canonical blocklist URLs, and each category to its canonical
//! blocklist URLs. URLs are resolved to concrete blocklist ids at refresh
//! time by matching against the store's blocklist rows.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

#[derive(Deserialize)]
struct RawApp {
    id: String,
    name: String,
    suffixes: Vec<String>,
    lists: Vec<String>,
}

#[derive(Deserialize)]
struct RawCategory {
    id: String,
    name: String,
    lists: Vec<String>,
}

#[derive(Deserialize)]
struct RawCatalog {
    apps: Vec<RawApp>,
    categories: Vec<RawCategory>,
}

#[derive(Clone)]
pub struct AppDefinition {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub suffixes: Vec<Arc<str>>,
    pub list_urls: Vec<Arc<str>>,
}

#[derive(Clone)]
pub struct CategoryDefinition {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub list_urls: Vec<Arc<str>>,
}

pub struct AppCatalog {
    apps: Vec<AppDefinition>,
    categories: Vec<CategoryDefinition>,
    apps_by_id: HashMap<Arc<str>, usize>,
    categories_by_id: HashMap<Arc<str>, usize>,
}

static CATALOG: LazyLock<AppCatalog> = LazyLock::new(AppCatalog::load);

impl AppCatalog {
    /// The process-wide catalog, parsed once from the embedded JSON.
    pub fn shared() -> &'static AppCatalog {
        &CATALOG
    }

    fn load() -> Self {
        let json = include_str!("catalog.json");
        let raw: RawCatalog = serde_json::from_str(json).expect("catalog.json must be valid JSON");

        let mut apps = Vec::with_capacity(raw.apps.len());
        let mut apps_by_id = HashMap::with_capacity(raw.apps.len());
        for (idx, app) in raw.apps.into_iter().enumerate() {
            let id: Arc<str> = Arc::from(app.id.as_str());
            apps_by_id.insert(Arc::clone(&id), idx);
            apps.push(AppDefinition {
                id,
                name: Arc::from(app.name.as_str()),
                suffixes: app.suffixes.iter().map(|s| Arc::from(s.as_str())).collect(),
                list_urls: app.lists.iter().map(|s| Arc::from(s.as_str())).collect(),
            });
        }

        let mut categories = Vec::with_capacity(raw.categories.len());
        let mut categories_by_id = HashMap::with_capacity(raw.categories.len());
        for (idx, category) in raw.categories.into_iter().enumerate() {
            let id: Arc<str> = Arc::from(category.id.as_str());
            categories_by_id.insert(Arc::clone(&id), idx);
            categories.push(CategoryDefinition {
                id,
                name: Arc::from(category.name.as_str()),
                list_urls: category.lists.iter().map(|s| Arc::from(s.as_str())).collect(),
            });
        }

        Self { apps, categories, apps_by_id, categories_by_id }
    }

    pub fn apps(&self) -> &[AppDefinition] {
        &self.apps
    }

    pub fn categories(&self) -> &[CategoryDefinition] {
        &self.categories
    }

    pub fn app(&self, id: &str) -> Option<&AppDefinition> {
        self.apps_by_id.get(id).map(|&idx| &self.apps[idx])
    }

    pub fn category(&self, id: &str) -> Option<&CategoryDefinition> {
        self.categories_by_id.get(id).map(|&idx| &self.categories[idx])
    }

    /// All catalog URLs, used to classify store blocklist rows as
    /// app/category lists during snapshot builds.
    pub fn is_app_list_url(&self, url: &str) -> bool {
        self.apps.iter().any(|app| app.list_urls.iter().any(|u| u.as_ref() == url))
    }

    pub fn is_category_list_url(&self, url: &str) -> bool {
        self.categories
            .iter()
            .any(|category| category.list_urls.iter().any(|u| u.as_ref() == url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_parses() {
        let catalog = AppCatalog::shared();
        assert!(!catalog.apps().is_empty());
        assert!(!catalog.categories().is_empty());
    }

    #[test]
    fn test_known_app_suffixes() {
        let tiktok = AppCatalog::shared().app("tiktok").unwrap();
        assert!(tiktok.suffixes.iter().any(|s| s.as_ref() == "tiktokcdn.com"));
    }

    #[test]
    fn test_url_classification() {
        let catalog = AppCatalog::shared();
        let app_url = catalog.apps()[0].list_urls[0].as_ref();
        assert!(catalog.is_app_list_url(app_url));
        assert!(!catalog.is_category_list_url(app_url));
        assert!(!catalog.is_app_list_url("https://example.com/unrelated.txt"));
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = AppCatalog::shared();
        assert!(catalog.app("youtube").is_some());
        assert!(catalog.app("nonexistent").is_none());
        assert!(catalog.category("ads").is_some());
    }
}
