use std::sync::Arc;

use navigator::{Navigator, WithDeadline};
use storage::Storage;

use crate::dispatch::Outbound;

pub(crate) type Engine = Navigator<WithDeadline<Storage>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) engine: Arc<Engine>,
    pub(crate) outbound: Arc<dyn Outbound>,
    pub(crate) webhook_secret: Option<String>,
}

impl AppState {
    pub(crate) fn storage(&self) -> &Storage {
        self.engine.store().inner()
    }
}
