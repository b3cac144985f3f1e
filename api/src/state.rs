use std::sync::Arc;

use crate::engine::Engine;
use crate::store::InteractionStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InteractionStore>,
    pub engine: Arc<Engine>,
}
