pub mod api;
pub mod core;
pub mod infra;
pub mod models;

pub mod ax_state {
    use std::sync::Arc;

    use crate::core::rows::RowModelDao;
    use crate::infra::cache::DataLakeCache;
    use crate::infra::db_external::ExternalDb;

    pub struct AppState<S = ExternalDb> {
        pub db: Arc<S>,
        pub rows: RowModelDao,
        pub cache: Arc<DataLakeCache>,
    }
}
