use std::sync::Arc;

use crate::services::{
    dispatcher::Dispatcher, queue::JobPublisher, result_handler::ResultHandler,
    store::ResultStore,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub results: Arc<ResultHandler>,
    pub store: Arc<dyn ResultStore>,
    pub queue: Arc<dyn JobPublisher>,
}

impl AppState {
    pub fn new(
        dispatcher: Dispatcher,
        results: ResultHandler,
        store: Arc<dyn ResultStore>,
        queue: Arc<dyn JobPublisher>,
    ) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            results: Arc::new(results),
            store,
            queue,
        }
    }
}
