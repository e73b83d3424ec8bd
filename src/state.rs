use std::sync::Arc;

use crate::{
    config::AppConfig,
    repository::{DocumentRepository, UserRepository},
    services::{AdminService, DocumentService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub documents: DocumentService,
    pub admin: AdminService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        documents: Arc<dyn DocumentRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            documents: DocumentService::new(documents.clone(), users.clone()),
            admin: AdminService::new(users, documents),
        }
    }
}
