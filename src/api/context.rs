use std::sync::Arc;

use crate::{config::Config, db::Transaction};


/// The context that is accessible to every resolver in our API.
pub(crate) struct Context {
    pub(crate) db: Transaction,
    pub(crate) config: Arc<Config>,
}

impl juniper::Context for Context {}
