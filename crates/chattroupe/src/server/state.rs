//! Application state for the HTTP server

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::Result;
use crate::session::{Assistant, Session, SessionManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: AppConfig,
    /// Pipelines shared by all sessions
    assistant: Assistant,
    /// Live sessions
    sessions: SessionManager,
    /// Server start time
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state around an already wired assistant
    pub fn new(config: AppConfig, assistant: Assistant) -> Self {
        let sessions = SessionManager::new(
            config.index.path.clone(),
            config.server.isolate_session_indexes,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                assistant,
                sessions,
                started_at: Utc::now(),
            }),
        }
    }

    /// Create state backed by Gemini
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let assistant = Assistant::from_config(&config)?;
        Ok(Self::new(config, assistant))
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn assistant(&self) -> &Assistant {
        &self.inner.assistant
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Look up a session
    pub fn session(&self, id: Uuid) -> Result<Arc<Mutex<Session>>> {
        self.inner.sessions.get(id)
    }
}
