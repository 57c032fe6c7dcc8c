//! SeaORM implementation of ReservationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    UpdateResult,
};

use crate::domain::reservation::{
    Reservation, ReservationPatch, ReservationRepository, ReservationStatus,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::reservation;

pub struct SeaOrmReservationRepository {
    db: DatabaseConnection,
}

impl SeaOrmReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: reservation::Model) -> DomainResult<Reservation> {
    let status = ReservationStatus::parse(&m.status).ok_or_else(|| {
        DomainError::Storage(format!("reservation {} has unknown status {}", m.id, m.status))
    })?;

    Ok(Reservation {
        id: m.id,
        station_id: m.station_id,
        user_id: m.user_id,
        start_time: m.start_time,
        end_time: m.end_time,
        expiration_time: m.expiration_time,
        pin: m.pin,
        arrived: m.arrived,
        status,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn models_to_domain(models: Vec<reservation::Model>) -> DomainResult<Vec<Reservation>> {
    models.into_iter().map(model_to_domain).collect()
}

// ── ReservationRepository impl ──────────────────────────────────

#[async_trait]
impl ReservationRepository for SeaOrmReservationRepository {
    async fn create(&self, r: Reservation) -> DomainResult<String> {
        debug!("Creating reservation: {} on station {}", r.id, r.station_id);

        let id = r.id.clone();
        let model = reservation::ActiveModel {
            id: Set(r.id),
            station_id: Set(r.station_id),
            user_id: Set(r.user_id),
            start_time: Set(r.start_time),
            end_time: Set(r.end_time),
            expiration_time: Set(r.expiration_time),
            pin: Set(r.pin),
            arrived: Set(r.arrived),
            status: Set(r.status.as_str().to_string()),
            created_at: Set(r.created_at),
            updated_at: Set(r.updated_at),
        };
        model.insert(&self.db).await?;
        Ok(id)
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Reservation>> {
        reservation::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_active(
        &self,
        station_id: &str,
        exclude: &[ReservationStatus],
    ) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::StationId.eq(station_id))
            .filter(reservation::Column::Status.is_not_in(exclude.iter().map(|s| s.as_str())))
            .order_by_asc(reservation::Column::StartTime)
            .all(&self.db)
            .await?;
        models_to_domain(models)
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected: ReservationStatus,
        patch: ReservationPatch,
    ) -> DomainResult<bool> {
        let mut update = reservation::Entity::update_many()
            .col_expr(reservation::Column::Status, Expr::value(patch.status.as_str()))
            .col_expr(reservation::Column::UpdatedAt, Expr::value(patch.updated_at));
        if let Some(arrived) = patch.arrived {
            update = update.col_expr(reservation::Column::Arrived, Expr::value(arrived));
        }

        let result: UpdateResult = update
            .filter(reservation::Column::Id.eq(id))
            .filter(reservation::Column::Status.eq(expected.as_str()))
            .exec(&self.db)
            .await?;

        debug!(
            "Reservation {} {} -> {}: {} row(s)",
            id, expected, patch.status, result.rows_affected
        );
        Ok(result.rows_affected == 1)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Booked.as_str()))
            .filter(reservation::Column::ExpirationTime.lt(now))
            .order_by_asc(reservation::Column::ExpirationTime)
            .all(&self.db)
            .await?;
        models_to_domain(models)
    }

    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(user_id))
            .order_by_desc(reservation::Column::CreatedAt)
            .all(&self.db)
            .await?;
        models_to_domain(models)
    }

    async fn find_all(&self) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .order_by_desc(reservation::Column::CreatedAt)
            .all(&self.db)
            .await?;
        models_to_domain(models)
    }
}
