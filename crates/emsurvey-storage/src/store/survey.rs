use anyhow::Result;
use chrono::Utc;
use emsurvey_common::types::{
    AssessmentReport, Survey, SurveyFilter, SurveyStatus, UpdateSurveyRequest,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use serde_json::Value;

use crate::entities::survey::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::SurveyStore;

/// 新调研单写入参数
#[derive(Debug, Clone)]
pub struct NewSurvey {
    pub title: String,
    pub customer_name: String,
    pub industry: Option<String>,
    pub region_code: Option<String>,
    pub template_id: String,
    pub creator_id: String,
    pub presales_id: Option<String>,
    pub answers: Value,
}

fn to_survey(m: survey::Model) -> Survey {
    let status = m.status.parse().unwrap_or_else(|e: String| {
        tracing::warn!(survey_id = %m.id, error = %e, "Unknown survey status in database");
        SurveyStatus::Draft
    });
    let answers = serde_json::from_str(&m.answers_json)
        .unwrap_or_else(|_| Value::Object(Default::default()));
    let report = m
        .report_json
        .as_deref()
        .and_then(|s| serde_json::from_str::<AssessmentReport>(s).ok());
    Survey {
        id: m.id,
        title: m.title,
        customer_name: m.customer_name,
        industry: m.industry,
        region_code: m.region_code,
        template_id: m.template_id,
        status,
        answers,
        report,
        creator_id: m.creator_id,
        presales_id: m.presales_id,
        submitted_at: m.submitted_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

/// Whether an answers value carries at least one entry.
fn has_answers(answers: &Value) -> bool {
    answers.as_object().is_some_and(|o| !o.is_empty())
}

fn apply_filter(mut q: Select<Entity>, filter: &SurveyFilter) -> Select<Entity> {
    if let Some(ref kw) = filter.keyword {
        q = q.filter(
            Condition::any()
                .add(Column::Title.contains(kw.as_str()))
                .add(Column::CustomerName.contains(kw.as_str())),
        );
    }
    if let Some(status) = filter.status_eq {
        q = q.filter(Column::Status.eq(status.as_str()));
    }
    if let Some(ref creator) = filter.creator_id_eq {
        q = q.filter(Column::CreatorId.eq(creator.as_str()));
    }
    if let Some(ref user_id) = filter.visible_to {
        q = q.filter(
            Condition::any()
                .add(Column::CreatorId.eq(user_id.as_str()))
                .add(Column::PresalesId.eq(user_id.as_str())),
        );
    }
    q
}

impl SurveyStore {
    pub async fn create_survey(&self, new: &NewSurvey) -> Result<Survey> {
        let id = emsurvey_common::id::next_id();
        let now = Utc::now().fixed_offset();
        let am = survey::ActiveModel {
            id: Set(id.clone()),
            title: Set(new.title.clone()),
            customer_name: Set(new.customer_name.clone()),
            industry: Set(new.industry.clone()),
            region_code: Set(new.region_code.clone()),
            template_id: Set(new.template_id.clone()),
            status: Set(SurveyStatus::Draft.as_str().to_owned()),
            answers_json: Set(serde_json::to_string(&new.answers)?),
            report_json: Set(None),
            creator_id: Set(new.creator_id.clone()),
            presales_id: Set(new.presales_id.clone()),
            submitted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        Ok(to_survey(m))
    }

    pub async fn get_survey(&self, id: &str) -> Result<Option<Survey>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_survey))
    }

    pub async fn list_surveys(
        &self,
        filter: &SurveyFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Survey>> {
        let rows = apply_filter(Entity::find(), filter)
            .order_by(Column::UpdatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_survey).collect())
    }

    pub async fn count_surveys(&self, filter: &SurveyFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    /// Apply metadata and answer edits.
    ///
    /// Completed surveys are rejected with [`StorageError::Rejected`].
    /// Saving non-empty answers moves a draft to `filling`.
    pub async fn update_survey(
        &self,
        id: &str,
        update: &UpdateSurveyRequest,
    ) -> Result<Option<Survey>> {
        let Some(m) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };
        if m.status == SurveyStatus::Completed.as_str() {
            return Err(StorageError::Rejected(format!("survey {id} is already completed")).into());
        }
        let was_draft = m.status == SurveyStatus::Draft.as_str();
        let mut am: survey::ActiveModel = m.into();
        if let Some(ref v) = update.title {
            am.title = Set(v.clone());
        }
        if let Some(ref v) = update.customer_name {
            am.customer_name = Set(v.clone());
        }
        if let Some(ref v) = update.industry {
            am.industry = Set(v.clone());
        }
        if let Some(ref v) = update.region_code {
            am.region_code = Set(v.clone());
        }
        if let Some(ref v) = update.presales_id {
            am.presales_id = Set(v.clone());
        }
        if let Some(ref answers) = update.answers {
            am.answers_json = Set(serde_json::to_string(answers)?);
            if was_draft && has_answers(answers) {
                am.status = Set(SurveyStatus::Filling.as_str().to_owned());
            }
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_survey(updated)))
    }

    /// Mark a survey completed and stamp `submitted_at`.
    pub async fn complete_survey(&self, id: &str) -> Result<Option<Survey>> {
        let Some(m) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };
        if m.status == SurveyStatus::Completed.as_str() {
            return Err(StorageError::Rejected(format!("survey {id} is already completed")).into());
        }
        let now = Utc::now().fixed_offset();
        let mut am: survey::ActiveModel = m.into();
        am.status = Set(SurveyStatus::Completed.as_str().to_owned());
        am.submitted_at = Set(Some(now));
        am.updated_at = Set(now);
        let updated = am.update(self.db()).await?;
        Ok(Some(to_survey(updated)))
    }

    /// Store (or replace) the assessment report of a survey.
    pub async fn set_survey_report(
        &self,
        id: &str,
        report: &AssessmentReport,
    ) -> Result<Option<Survey>> {
        let Some(m) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };
        let mut am: survey::ActiveModel = m.into();
        am.report_json = Set(Some(serde_json::to_string(report)?));
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_survey(updated)))
    }

    pub async fn delete_survey(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
