//! Theme history tracking.
//!
//! Records which theme the application last ran with so frontends can
//! react to theme transitions. The sequencer materializes exactly one
//! `ThemeHistory` per process.

use parking_lot::Mutex;
use tracing::info;

/// History of applied themes.
pub struct ThemeHistory {
    current: Mutex<Option<String>>,
    past: Mutex<Vec<String>>,
}

impl ThemeHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            past: Mutex::new(Vec::new()),
        }
    }

    /// Compare the given theme against the recorded one, archiving the
    /// old theme on a transition. Returns `true` if the theme changed.
    pub fn check_new_theme(&self, theme: Option<&str>) -> bool {
        let mut current = self.current.lock();
        let new = theme.map(str::to_string);
        if *current == new {
            return false;
        }

        if let Some(old) = current.take() {
            self.past.lock().push(old);
        }
        info!(
            "Theme changed to {}",
            new.as_deref().unwrap_or("<default>")
        );
        *current = new;
        true
    }

    /// The currently recorded theme.
    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }

    /// Previously applied themes, oldest first.
    pub fn past_themes(&self) -> Vec<String> {
        self.past.lock().clone()
    }
}

impl Default for ThemeHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_theme_is_a_change() {
        let history = ThemeHistory::new();
        assert!(history.check_new_theme(Some("dark")));
        assert_eq!(history.current().as_deref(), Some("dark"));
        assert!(history.past_themes().is_empty());
    }

    #[test]
    fn test_same_theme_is_not_a_change() {
        let history = ThemeHistory::new();
        history.check_new_theme(Some("dark"));
        assert!(!history.check_new_theme(Some("dark")));
    }

    #[test]
    fn test_transition_archives_old_theme() {
        let history = ThemeHistory::new();
        history.check_new_theme(Some("dark"));
        assert!(history.check_new_theme(Some("light")));
        assert_eq!(history.past_themes(), vec!["dark".to_string()]);
        assert_eq!(history.current().as_deref(), Some("light"));
    }
}
