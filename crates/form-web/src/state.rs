use std::sync::Arc;

use form_service::FormService;

use crate::auth::SessionStore;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FormService>,
    pub settings: Arc<Settings>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(service: FormService, settings: Settings) -> Self {
        let sessions = SessionStore::new(settings.admin.session_ttl_secs);
        Self {
            service: Arc::new(service),
            settings: Arc::new(settings),
            sessions: Arc::new(sessions),
        }
    }
}
