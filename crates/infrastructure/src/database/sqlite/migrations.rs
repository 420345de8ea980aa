use sqlx::SqlitePool;
use tracing::info;

/// 建表语句，按顺序执行，全部幂等
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS feeds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        provider TEXT NOT NULL,
        source_tag TEXT,
        active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        feed_id INTEGER NOT NULL REFERENCES feeds(id),
        title TEXT NOT NULL DEFAULT '',
        has_post_main_image INTEGER NOT NULL DEFAULT 0,
        has_extracted_main_image INTEGER NOT NULL DEFAULT 0,
        images_processed INTEGER NOT NULL DEFAULT 0,
        has_resized_images INTEGER NOT NULL DEFAULT 0,
        resize_failures INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_feed_processed ON posts(feed_id, images_processed)",
    r#"
    CREATE TABLE IF NOT EXISTS images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL,
        image_index INTEGER NOT NULL,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        extension TEXT NOT NULL,
        image_type TEXT NOT NULL,
        source_extension TEXT,
        use_for_main_image INTEGER NOT NULL DEFAULT 0,
        fit_mode TEXT,
        cropped INTEGER NOT NULL DEFAULT 0,
        quality INTEGER,
        file_size INTEGER,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_images_post_index ON images(post_id, image_index)",
    r#"
    CREATE TABLE IF NOT EXISTS image_generations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        fit_mode TEXT NOT NULL,
        crop INTEGER NOT NULL DEFAULT 0,
        quality INTEGER NOT NULL DEFAULT 80,
        ext_dest TEXT NOT NULL,
        use_for_main_image INTEGER NOT NULL DEFAULT 0,
        active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS batches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_type TEXT NOT NULL,
        schedule_id TEXT,
        status TEXT NOT NULL,
        pending_items INTEGER NOT NULL DEFAULT 0,
        error TEXT,
        created_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS batch_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id INTEGER NOT NULL REFERENCES batches(id),
        feed_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        error TEXT,
        stack TEXT,
        posts_total INTEGER NOT NULL DEFAULT 0,
        posts_failed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        completed_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_batch_items_batch ON batch_items(batch_id)",
    r#"
    CREATE TABLE IF NOT EXISTS process_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scope TEXT NOT NULL,
        name TEXT NOT NULL,
        success_count INTEGER NOT NULL,
        success_bytes INTEGER NOT NULL,
        error_count INTEGER NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT NOT NULL
    )
    "#,
];

/// 创建所有表与索引
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(pool).await?;
    }
    info!("数据库迁移完成: {} 条语句", SCHEMA.len());
    Ok(())
}
