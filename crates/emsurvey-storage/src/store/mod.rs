use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::path::Path;

pub mod dictionary;
pub mod log;
pub mod message;
pub mod product;
pub mod region;
pub mod role;
pub mod survey;
pub mod user;

pub use dictionary::DictTypeFilter;

/// 管理数据库（emsurvey.db）的统一访问层。
///
/// 所有方法均为 `async fn`，底层使用 SeaORM + SQLite。
pub struct SurveyStore {
    pub(crate) db: DatabaseConnection,
}

impl SurveyStore {
    /// 连接并初始化管理数据库。
    ///
    /// - `db_url`：完整的数据库连接 URL，如 `sqlite:///data/emsurvey.db?mode=rwc`
    /// - `data_dir`：本地数据目录，启动时确保存在
    ///
    /// 自动运行 `sea-orm-migration` 迁移，确保 Schema 最新。
    pub async fn new(db_url: &str, data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let mut opts = ConnectOptions::new(db_url.to_owned());
        opts.sqlx_logging(false);
        let db = Database::connect(opts).await?;

        // WAL 模式仅对 SQLite 文件库有效
        if db_url.starts_with("sqlite://") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;

        tracing::info!(db_url = %db_url, "Initialized survey store (SeaORM)");
        Ok(Self { db })
    }

    /// 返回底层数据库连接引用（供子模块使用）。
    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Liveness check used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await?;
        Ok(())
    }
}
