use std::sync::Arc;

use turnstile_core::AdmissionService;

#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionService>,
}
