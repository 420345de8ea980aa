pub mod sqlite;

pub use sqlite::{
    run_migrations, DatabaseManager, DbPool, SqliteBatchRepository, SqliteFeedRepository,
    SqliteImageGenerationRepository, SqliteImageRepository, SqlitePostRepository,
    SqliteStatsRepository,
};
