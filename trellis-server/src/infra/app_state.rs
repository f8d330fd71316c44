use std::{fmt, sync::Arc};

use trellis_core::{Inventory, IngestionPipeline};

use crate::infra::config::Config;
use crate::infra::websocket::SubscriberHub;

#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<dyn Inventory>,
    pub pipeline: Arc<IngestionPipeline>,
    pub hub: Arc<SubscriberHub>,
    pub config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("subscribers", &self.hub.subscriber_count())
            .finish_non_exhaustive()
    }
}
