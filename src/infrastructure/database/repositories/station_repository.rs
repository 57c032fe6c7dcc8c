//! SeaORM implementation of StationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, UpdateResult,
};

use crate::domain::station::{AdmissionHold, Station, StationRepository, StationStatus};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::station;

pub struct SeaOrmStationRepository {
    db: DatabaseConnection,
}

impl SeaOrmStationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: station::Model) -> DomainResult<Station> {
    let status = StationStatus::parse(&m.status).ok_or_else(|| {
        DomainError::Storage(format!("station {} has unknown status {}", m.id, m.status))
    })?;
    let hold = match (m.hold_token, m.hold_expires_at) {
        (Some(token), Some(expires_at)) => Some(AdmissionHold { token, expires_at }),
        _ => None,
    };

    Ok(Station {
        id: m.id,
        code: m.code,
        status,
        revision: m.revision,
        hold,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

// ── StationRepository impl ──────────────────────────────────────

#[async_trait]
impl StationRepository for SeaOrmStationRepository {
    async fn save(&self, s: Station) -> DomainResult<()> {
        debug!("Saving station: {} ({})", s.id, s.code);

        let (hold_token, hold_expires_at) = match s.hold {
            Some(h) => (Some(h.token), Some(h.expires_at)),
            None => (None, None),
        };
        let model = station::ActiveModel {
            id: Set(s.id),
            code: Set(s.code),
            status: Set(s.status.as_str().to_string()),
            revision: Set(s.revision),
            hold_token: Set(hold_token),
            hold_expires_at: Set(hold_expires_at),
            created_at: Set(s.created_at),
            updated_at: Set(s.updated_at),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Station>> {
        station::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_all(&self) -> DomainResult<Vec<Station>> {
        station::Entity::find()
            .order_by_asc(station::Column::Code)
            .all(&self.db)
            .await?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    async fn conditional_update_status(
        &self,
        id: &str,
        expected_status: StationStatus,
        expected_revision: i64,
        new_status: StationStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result: UpdateResult = station::Entity::update_many()
            .col_expr(station::Column::Status, Expr::value(new_status.as_str()))
            .col_expr(
                station::Column::Revision,
                Expr::col(station::Column::Revision).add(1),
            )
            .col_expr(station::Column::UpdatedAt, Expr::value(now))
            .filter(station::Column::Id.eq(id))
            .filter(station::Column::Status.eq(expected_status.as_str()))
            .filter(station::Column::Revision.eq(expected_revision))
            .exec(&self.db)
            .await?;

        debug!(
            "Station {} status {} -> {} (rev {}): {} row(s)",
            id, expected_status, new_status, expected_revision, result.rows_affected
        );
        Ok(result.rows_affected == 1)
    }

    async fn try_acquire_hold(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result: UpdateResult = station::Entity::update_many()
            .col_expr(station::Column::HoldToken, Expr::value(token))
            .col_expr(station::Column::HoldExpiresAt, Expr::value(expires_at))
            .filter(station::Column::Id.eq(id))
            .filter(
                Condition::any()
                    .add(station::Column::HoldExpiresAt.is_null())
                    .add(station::Column::HoldExpiresAt.lte(now)),
            )
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn renew_hold(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result: UpdateResult = station::Entity::update_many()
            .col_expr(station::Column::HoldExpiresAt, Expr::value(expires_at))
            .filter(station::Column::Id.eq(id))
            .filter(station::Column::HoldToken.eq(token))
            .filter(station::Column::HoldExpiresAt.gt(now))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn release_hold(&self, id: &str, token: &str) -> DomainResult<bool> {
        let result: UpdateResult = station::Entity::update_many()
            .col_expr(station::Column::HoldToken, Expr::value(Option::<String>::None))
            .col_expr(
                station::Column::HoldExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(station::Column::Id.eq(id))
            .filter(station::Column::HoldToken.eq(token))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }
}
