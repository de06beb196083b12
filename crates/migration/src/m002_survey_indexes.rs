use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m002_survey_indexes"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

// 列表页按创建人/售前负责人 + 更新时间排序
const UP_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_surveys_creator ON surveys(creator_id, updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_surveys_presales ON surveys(presales_id, updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_surveys_status ON surveys(status);
";

const DOWN_SQL: &str = "
DROP INDEX IF EXISTS idx_surveys_status;
DROP INDEX IF EXISTS idx_surveys_presales;
DROP INDEX IF EXISTS idx_surveys_creator;
";
