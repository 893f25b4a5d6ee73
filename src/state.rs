use crate::db::{DbPool, OrmConn};
use crate::services::mailer::Mailer;

/// Process-wide handles, built once at startup and passed into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub mailer: Mailer,
}
