/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::services::auth::DpopAuthorizer;

#[derive(Clone)]
pub struct AppState {
    pub authorizer: Arc<DpopAuthorizer>,
    // htu reconstruction: prefer this over forwarded headers when set
    pub public_base_url: Option<Arc<str>>,
}

impl AppState {
    pub fn new(authorizer: Arc<DpopAuthorizer>, public_base_url: Option<String>) -> Self {
        Self {
            authorizer,
            public_base_url: public_base_url.map(Arc::from),
        }
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }
}
