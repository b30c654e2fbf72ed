//! Shared helpers for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use chattroupe::config::AppConfig;
use chattroupe::fixtures::encode_image;
use chattroupe::providers::{MockEmbedder, MockLlm};
use chattroupe::server::state::AppState;
use chattroupe::Assistant;
use tempfile::TempDir;

pub use chattroupe::fixtures::build_pdf;

/// A small PNG
pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, image::ImageFormat::Png)
}

/// Everything a test needs, with the index under a temp dir
pub struct Harness {
    pub config: AppConfig,
    pub embedder: Arc<MockEmbedder>,
    pub llm: Arc<MockLlm>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(llm: MockLlm) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.index.path = dir.path().join("index");
        config.chunking.chunk_size = 200;
        config.chunking.chunk_overlap = 20;

        Self {
            config,
            embedder: Arc::new(MockEmbedder::default()),
            llm: Arc::new(llm),
            dir,
        }
    }

    pub fn assistant(&self) -> Assistant {
        Assistant::new(&self.config, self.embedder.clone(), self.llm.clone())
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.config.clone(), self.assistant())
    }
}
