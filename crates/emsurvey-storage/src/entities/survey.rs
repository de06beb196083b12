use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "surveys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub customer_name: String,
    pub industry: Option<String>,
    pub region_code: Option<String>,
    pub template_id: String,
    /// draft / filling / completed
    pub status: String,
    pub answers_json: String,
    pub report_json: Option<String>,
    pub creator_id: String,
    pub presales_id: Option<String>,
    pub submitted_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
