//! Built-in search engine registry.

use parking_lot::Mutex;
use tracing::info;

/// A video search engine the frontend can query through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEngine {
    /// Stable identifier.
    pub name: String,

    /// Human-readable title.
    pub title: String,

    /// Query URL template; `%s` is replaced by the search terms.
    pub url_template: String,
}

const BUILTIN_ENGINES: &[(&str, &str, &str)] = &[
    (
        "youtube",
        "YouTube",
        "https://www.youtube.com/results?search_query=%s",
    ),
    (
        "archive",
        "Internet Archive",
        "https://archive.org/search?query=%s",
    ),
    (
        "vimeo",
        "Vimeo",
        "https://vimeo.com/search?q=%s",
    ),
    (
        "blogdigger",
        "Blogdigger",
        "https://www.blogdigger.com/media/rss.jsp?q=%s",
    ),
];

/// Registry of the engines available to the frontend.
pub struct SearchEngineRegistry {
    engines: Mutex<Vec<SearchEngine>>,
}

impl SearchEngineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            engines: Mutex::new(Vec::new()),
        }
    }

    /// Instantiate the built-in engine set. A second call is a no-op.
    pub fn create_engines(&self) {
        let mut engines = self.engines.lock();
        if !engines.is_empty() {
            return;
        }
        for (name, title, url_template) in BUILTIN_ENGINES {
            engines.push(SearchEngine {
                name: name.to_string(),
                title: title.to_string(),
                url_template: url_template.to_string(),
            });
        }
        info!("Created {} search engines", engines.len());
    }

    /// All registered engines.
    pub fn engines(&self) -> Vec<SearchEngine> {
        self.engines.lock().clone()
    }

    /// Build the query URL for the named engine, or `None` if the engine
    /// is unknown.
    pub fn search_url(&self, name: &str, terms: &str) -> Option<String> {
        let engines = self.engines.lock();
        let engine = engines.iter().find(|e| e.name == name)?;
        Some(engine.url_template.replace("%s", &terms.replace(' ', "+")))
    }
}

impl Default for SearchEngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
