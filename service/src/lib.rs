use config::Config;
use log::info;
use sse::Manager;
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<Manager>,
}

impl AppState {
    pub fn new(app_config: Config) -> Self {
        let sse_manager = Manager::with_default_retry(app_config.default_retry());
        info!(
            "Stream sessions announce a reconnect delay of {}ms",
            sse_manager.default_retry().as_millis()
        );
        Self {
            config: app_config,
            sse_manager: Arc::new(sse_manager),
        }
    }

    pub fn sse_manager(&self) -> &Manager {
        self.sse_manager.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn test_app_state_builds_manager_from_config() {
        let config = Config::parse_from(["patchstream_rs", "--default-retry-ms", "3000"]);
        let app_state = AppState::new(config);

        assert_eq!(
            app_state.sse_manager().default_retry(),
            Duration::from_millis(3000)
        );
    }
}
