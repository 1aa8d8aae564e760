//! Display names for the applications clips were copied from

use lru::LruCache;
use std::env;
use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Default number of cached id -> name mappings
const DEFAULT_CACHE_SIZE: usize = 64;

/// Resolves an application id to a human-readable name
pub trait AppNameLookup: Send {
    fn lookup(&self, app_id: &str) -> Option<String>;
}

/// Looks up application ids in XDG `.desktop` files
pub struct DesktopEntryLookup {
    dirs: Vec<PathBuf>,
}

impl DesktopEntryLookup {
    /// Search the given `applications` directories, in order
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        DesktopEntryLookup { dirs }
    }

    /// Search $XDG_DATA_HOME and $XDG_DATA_DIRS
    pub fn from_env() -> Self {
        let mut roots = Vec::new();

        match env::var("XDG_DATA_HOME") {
            Ok(dir) if !dir.is_empty() => roots.push(PathBuf::from(dir)),
            _ => {
                if let Ok(home) = env::var("HOME") {
                    roots.push(PathBuf::from(home).join(".local/share"));
                }
            }
        }

        let data_dirs = env::var("XDG_DATA_DIRS")
            .ok()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
        roots.extend(data_dirs.split(':').filter(|d| !d.is_empty()).map(PathBuf::from));

        Self::new(roots.into_iter().map(|r| r.join("applications")).collect())
    }
}

impl AppNameLookup for DesktopEntryLookup {
    fn lookup(&self, app_id: &str) -> Option<String> {
        if app_id.contains('/') || app_id.starts_with('.') {
            return None;
        }

        let file_name = format!("{}.desktop", app_id);
        let lower_name = file_name.to_lowercase();

        self.dirs.iter().find_map(|dir| {
            [&file_name, &lower_name].into_iter().find_map(|name| {
                let contents = fs::read_to_string(dir.join(name)).ok()?;
                parse_desktop_name(&contents)
            })
        })
    }
}

/// Extract the untranslated `Name=` from the `[Desktop Entry]` group
fn parse_desktop_name(contents: &str) -> Option<String> {
    let mut in_entry = false;
    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_entry = line == "[Desktop Entry]";
            continue;
        }
        if !in_entry {
            continue;
        }
        if let Some(value) = line.strip_prefix("Name=") {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Resolves display names for entries, caching lookups for the process lifetime
pub struct AppNameResolver {
    cache: LruCache<String, String>,
    lookup: Box<dyn AppNameLookup>,
}

impl AppNameResolver {
    pub fn new(lookup: Box<dyn AppNameLookup>, capacity: NonZeroUsize) -> Self {
        AppNameResolver {
            cache: LruCache::new(capacity),
            lookup,
        }
    }

    pub fn with_lookup(lookup: Box<dyn AppNameLookup>) -> Self {
        Self::new(
            lookup,
            NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
        )
    }

    /// Name to show for a clip's source application
    ///
    /// A recorded name wins. Otherwise the id is resolved through the cache,
    /// then the lookup. Failed lookups are not cached.
    pub fn display_name(&mut self, source_name: Option<&str>, app_id: Option<&str>) -> Option<String> {
        if let Some(name) = source_name.filter(|n| !n.is_empty()) {
            return Some(name.to_string());
        }

        let app_id = app_id.filter(|id| !id.is_empty())?;
        if let Some(cached) = self.cache.get(app_id) {
            return Some(cached.clone());
        }

        let name = self.lookup.lookup(app_id)?;
        self.cache.put(app_id.to_string(), name.clone());
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: Arc<AtomicUsize>,
    }

    impl AppNameLookup for CountingLookup {
        fn lookup(&self, app_id: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (app_id == "org.example.Editor").then(|| "Editor".to_string())
        }
    }

    #[test]
    fn test_recorded_name_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = AppNameResolver::with_lookup(Box::new(CountingLookup {
            calls: Arc::clone(&calls),
        }));

        let name = resolver.display_name(Some("Firefox"), Some("org.example.Editor"));
        assert_eq!(name.as_deref(), Some("Firefox"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_lookup_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = AppNameResolver::with_lookup(Box::new(CountingLookup {
            calls: Arc::clone(&calls),
        }));

        assert_eq!(
            resolver.display_name(Some(""), Some("org.example.Editor")).as_deref(),
            Some("Editor")
        );
        assert_eq!(
            resolver.display_name(None, Some("org.example.Editor")).as_deref(),
            Some("Editor")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(resolver.display_name(None, Some("unknown")), None);
        assert_eq!(resolver.display_name(None, None), None);
    }

    #[test]
    fn test_desktop_entry_lookup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("org.gnome.TextEditor.desktop"),
            "[Desktop Entry]\nName[de]=Texteditor\nName=Text Editor\nExec=gnome-text-editor\n\n[Desktop Action new-window]\nName=New Window\n",
        )
        .unwrap();
        let lookup = DesktopEntryLookup::new(vec![dir.path().to_path_buf()]);

        assert_eq!(
            lookup.lookup("org.gnome.TextEditor").as_deref(),
            Some("Text Editor")
        );
        assert_eq!(lookup.lookup("missing"), None);
        assert_eq!(lookup.lookup("../etc/passwd"), None);
    }

    #[test]
    fn test_parse_desktop_name_ignores_other_groups() {
        let contents = "[Desktop Action x]\nName=Action\n[Desktop Entry]\nType=Application\n";
        assert_eq!(parse_desktop_name(contents), None);
    }
}
