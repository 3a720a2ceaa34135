use std::{sync::Arc, time::Duration};

use fileforge_jobs::BatchRunner;
use fileforge_notify::ProgressHub;
use fileforge_tools::{
    DocumentFetcher, FormatConverter, ImageResizer, PasswordGenerator, QrGenerator,
};

/// One shared instance of every work function.
pub struct Toolbox {
    pub password: Arc<PasswordGenerator>,
    pub qr: Arc<QrGenerator>,
    pub fetch: Arc<DocumentFetcher>,
    pub convert: Arc<FormatConverter>,
    pub resize: Arc<ImageResizer>,
}

impl Toolbox {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self {
            password: Arc::new(PasswordGenerator),
            qr: Arc::new(QrGenerator),
            fetch: Arc::new(DocumentFetcher::new(fetch_timeout)),
            convert: Arc::new(FormatConverter),
            resize: Arc::new(ImageResizer),
        }
    }
}

impl Default for Toolbox {
    fn default() -> Self {
        Self {
            password: Arc::new(PasswordGenerator),
            qr: Arc::new(QrGenerator),
            fetch: Arc::new(DocumentFetcher::default()),
            convert: Arc::new(FormatConverter),
            resize: Arc::new(ImageResizer),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub runner: BatchRunner,
    pub hub: Arc<ProgressHub>,
    pub tools: Arc<Toolbox>,
}

impl AppState {
    pub fn new(runner: BatchRunner, hub: Arc<ProgressHub>, tools: Toolbox) -> Self {
        Self {
            runner,
            hub,
            tools: Arc::new(tools),
        }
    }
}
