use std::sync::Arc;

use application::{Dispatcher, HistoryService};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub history: Arc<HistoryService>,
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        history: Arc<HistoryService>,
        cors_origins: Vec<String>,
    ) -> Self {
        Self {
            dispatcher,
            history,
            cors_origins,
        }
    }
}
