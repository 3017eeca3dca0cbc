//! Navigation collaborator.

use std::sync::Mutex;

use crate::state::lock;

/// Navigate-to-path capability of whatever UI shell hosts the controller.
pub trait Router: Send + Sync {
    fn current_path(&self) -> String;

    fn navigate(&self, path: &str);
}

/// In-memory router keeping the full navigation history.
#[derive(Debug)]
pub struct HistoryRouter {
    history: Mutex<Vec<String>>,
}

impl HistoryRouter {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![start.into()]),
        }
    }

    pub fn history(&self) -> Vec<String> {
        lock(&self.history).clone()
    }
}

impl Router for HistoryRouter {
    fn current_path(&self) -> String {
        lock(&self.history).last().cloned().unwrap_or_else(|| "/".to_string())
    }

    fn navigate(&self, path: &str) {
        tracing::debug!(path, "navigating");
        lock(&self.history).push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_current_path() {
        let router = HistoryRouter::new("/customers");
        router.navigate("/login");
        assert_eq!(router.current_path(), "/login");
        assert_eq!(router.history(), vec!["/customers", "/login"]);
    }
}
