use std::sync::Arc;

use confmig_core::run::RunCoordinator;
use confmig_core::stream::MetricsTransport;
use confmig_core::SettingsStore;
use confmig_events::Bus;

use crate::backend::{HttpBackend, ProjectDirectory};
use crate::cli::{CliExecutor, ProcessCliExecutor};
use crate::config::AppConfig;
use crate::metrics_transport::PollingMetricsTransport;

#[derive(Clone)]
pub(crate) struct AppState {
    bus: Bus,
    config: Arc<AppConfig>,
    store: Arc<dyn SettingsStore>,
    directory: Arc<dyn ProjectDirectory>,
    transport: Arc<dyn MetricsTransport>,
    cli: Arc<dyn CliExecutor>,
    runs: RunCoordinator,
}

impl AppState {
    pub fn builder(config: AppConfig) -> AppStateBuilder {
        AppStateBuilder {
            config,
            bus: None,
            store: None,
            directory: None,
            transport: None,
            cli: None,
        }
    }

    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub fn directory(&self) -> &dyn ProjectDirectory {
        self.directory.as_ref()
    }

    pub fn transport(&self) -> Arc<dyn MetricsTransport> {
        self.transport.clone()
    }

    pub fn cli(&self) -> &dyn CliExecutor {
        self.cli.as_ref()
    }

    pub fn runs(&self) -> &RunCoordinator {
        &self.runs
    }
}

pub(crate) struct AppStateBuilder {
    config: AppConfig,
    bus: Option<Bus>,
    store: Option<Arc<dyn SettingsStore>>,
    directory: Option<Arc<dyn ProjectDirectory>>,
    transport: Option<Arc<dyn MetricsTransport>>,
    cli: Option<Arc<dyn CliExecutor>>,
}

#[allow(dead_code)]
impl AppStateBuilder {
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn ProjectDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn MetricsTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_cli(mut self, cli: Arc<dyn CliExecutor>) -> Self {
        self.cli = Some(cli);
        self
    }

    pub fn build(self) -> AppState {
        let config = Arc::new(self.config);
        let bus = self.bus.unwrap_or_else(|| Bus::new(256));
        let backend = || {
            Arc::new(HttpBackend::new(
                config.api_base.clone(),
                config.api_token.clone(),
            ))
        };
        let store: Arc<dyn SettingsStore> = match self.store {
            Some(store) => store,
            None => backend(),
        };
        let directory: Arc<dyn ProjectDirectory> = match self.directory {
            Some(directory) => directory,
            None => backend(),
        };
        let transport: Arc<dyn MetricsTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(PollingMetricsTransport::new(
                config.api_token.clone(),
                config.refresh,
            )),
        };
        let cli: Arc<dyn CliExecutor> = match self.cli {
            Some(cli) => cli,
            None => Arc::new(ProcessCliExecutor::new(config.cli_timeout)),
        };
        AppState {
            bus,
            config,
            store,
            directory,
            transport,
            cli,
            runs: RunCoordinator::new(),
        }
    }
}
