//! Diesel row types for the report store, converted to and from the domain
//! [`Report`] at the repository boundary.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{rate_counters, reports};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::{BeachCondition, CrowdLevel, Report, WaterCondition};

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = reports)]
pub struct ReportRow {
    pub id: Uuid,
    pub location_id: String,
    pub crowd_level: i16,
    pub water_condition: Option<i16>,
    pub beach_condition: Option<i16>,
    pub reporter_hash: String,
    pub attribution: Option<serde_json::Value>,
    pub client_origin: Option<String>,
    pub client_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Report> for ReportRow {
    fn from(report: &Report) -> Self {
        Self {
            id: report.id,
            location_id: report.location_id.clone(),
            crowd_level: report.crowd_level.code() as i16,
            water_condition: report.water_condition.map(|c| c.code() as i16),
            beach_condition: report.beach_condition.map(|c| c.code() as i16),
            reporter_hash: report.reporter_hash.clone(),
            attribution: report
                .attribution
                .as_ref()
                .map(|a| serde_json::Value::Object(a.clone())),
            client_origin: report.client_origin.clone(),
            client_agent: report.client_agent.clone(),
            created_at: report.created_at,
        }
    }
}

impl TryFrom<ReportRow> for Report {
    type Error = RepositoryError;

    fn try_from(row: ReportRow) -> RepositoryResult<Self> {
        let crowd_level = CrowdLevel::from_code(row.crowd_level as u8).ok_or_else(|| {
            RepositoryError::internal(format!(
                "report {} has invalid crowd_level {}",
                row.id, row.crowd_level
            ))
        })?;

        let water_condition = row
            .water_condition
            .map(|code| {
                WaterCondition::from_code(code as u8).ok_or_else(|| {
                    RepositoryError::internal(format!(
                        "report {} has invalid water_condition {}",
                        row.id, code
                    ))
                })
            })
            .transpose()?;

        let beach_condition = row
            .beach_condition
            .map(|code| {
                BeachCondition::from_code(code as u8).ok_or_else(|| {
                    RepositoryError::internal(format!(
                        "report {} has invalid beach_condition {}",
                        row.id, code
                    ))
                })
            })
            .transpose()?;

        let attribution = match row.attribution {
            Some(serde_json::Value::Object(map)) => Some(map),
            Some(_) | None => None,
        };

        Ok(Report {
            id: row.id,
            location_id: row.location_id,
            crowd_level,
            water_condition,
            beach_condition,
            reporter_hash: row.reporter_hash,
            created_at: row.created_at,
            attribution,
            client_origin: row.client_origin,
            client_agent: row.client_agent,
        })
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = rate_counters)]
pub struct RateCounterRow {
    pub counter_key: String,
    pub count: i64,
    pub expires_at: DateTime<Utc>,
}
