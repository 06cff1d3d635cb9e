use services::AppServices;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    /// Mark cookies `Secure`; on whenever the public base URL is https.
    pub secure_cookies: bool,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices, secure_cookies: bool) -> Self {
        Self {
            services,
            secure_cookies,
        }
    }
}
