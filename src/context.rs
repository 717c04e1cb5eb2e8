use std::sync::Arc;

use crate::config::ResolvedConfig;
use crate::core::compiler::Host;
use crate::core::notifications::{self, NotificationChannel};
use crate::core::runner::{CommandRunner, ProcessRunner};
use crate::core::toolchain::{ArchiveFetcher, HttpFetcher};

/// Everything a packaging run needs, with the outside world behind traits.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ResolvedConfig>,
    pub runner: Arc<dyn CommandRunner>,
    pub fetcher: Arc<dyn ArchiveFetcher>,
    pub notifier: Option<Arc<dyn NotificationChannel>>,
    pub host: Host,
}

impl AppContext {
    /// Real processes, HTTPS downloads and the configured notifier.
    pub fn new(config: ResolvedConfig) -> Self {
        let notifier = notifications::create_notifier(&config.settings.notifications);
        Self {
            config: Arc::new(config),
            runner: Arc::new(ProcessRunner),
            fetcher: Arc::new(HttpFetcher::default()),
            notifier,
            host: Host::current(),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationChannel>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_host(mut self, host: Host) -> Self {
        self.host = host;
        self
    }
}
