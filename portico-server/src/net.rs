use crate::Registry;
use std::sync::Arc;

pub mod extract;
pub mod http;
pub mod response;

#[derive(Clone)]
pub struct AppCtx {
    pub registry: Arc<Registry>,
}
