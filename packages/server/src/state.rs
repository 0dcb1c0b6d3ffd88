use sea_orm::DatabaseConnection;

use crate::accounting::FileService;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub files: FileService,
}
