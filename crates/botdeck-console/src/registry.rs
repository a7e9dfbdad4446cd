//! In-memory snapshot of the fleet; the single source the table renders from.

use botdeck_protocol::Application;
use thiserror::Error;

use crate::table::RowSink;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no application with id '{0}' in the current snapshot")]
    NotFound(String),
}

#[derive(Debug, Default)]
pub struct AppRegistry {
    apps: Vec<Application>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the current snapshot, store `apps` and re-render every row.
    pub fn replace_all(&mut self, apps: Vec<Application>, view: &mut dyn RowSink) {
        tracing::debug!(count = apps.len(), "registry replaced");
        self.apps = apps;
        view.render_all(&self.apps);
    }

    /// Replace the application with `id` in place and re-render only its row.
    ///
    /// An unknown id leaves the registry and the view untouched; the update is
    /// dropped until the next full snapshot.
    pub fn upsert(
        &mut self,
        id: &str,
        app: Application,
        view: &mut dyn RowSink,
    ) -> Result<usize, RegistryError> {
        let Some(index) = self.apps.iter().position(|a| a.id == id) else {
            tracing::warn!(app_id = %id, "update for unknown application dropped");
            return Err(RegistryError::NotFound(id.to_string()));
        };
        self.apps[index] = app;
        view.render_one(&self.apps[index]);
        Ok(index)
    }

    pub fn get(&self, id: &str) -> Option<&Application> {
        self.apps.iter().find(|a| a.id == id)
    }

    pub fn apps(&self) -> &[Application] {
        &self.apps
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.apps.iter().filter(|a| a.running).count()
    }
}
