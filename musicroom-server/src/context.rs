use std::sync::Arc;

use axum::extract::FromRef;
use musicroom_collab::Collab;

use crate::connections::ConnectionRegistry;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
    pub connections: Arc<ConnectionRegistry>,
}

impl ServerContext {
    pub fn new(collab: Collab) -> Self {
        Self {
            collab: Arc::new(collab),
            connections: ConnectionRegistry::new(),
        }
    }
}
