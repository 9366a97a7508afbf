use std::sync::Arc;

use crate::{
    config::Config, hub::EventHub, repositories::UserRepository, services::AuthService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: AuthService,
    pub hub: Arc<EventHub>,
}

impl AppState {
    pub fn new(config: Config, users: Arc<dyn UserRepository>) -> Self {
        let auth = AuthService::from_config(users, &config);
        Self {
            config: Arc::new(config),
            auth,
            hub: Arc::new(EventHub::new()),
        }
    }
}
