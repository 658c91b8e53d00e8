use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyfare_core::repository::{RepositoryError, TicketPage, TicketRepository};
use skyfare_core::ticket::{Pnr, Ticket};
use skyfare_shared::{Passenger, PaymentMethod, TicketStatus};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Postgres ticket store. Uses the runtime query API so the crate builds
/// without a live database.
pub struct PgTicketRepository {
    pool: PgPool,
}

impl PgTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx(err: sqlx::Error) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        // 23505: unique_violation
        if db_err.code().as_deref() == Some("23505") {
            return RepositoryError::Duplicate(db_err.message().to_string());
        }
    }
    RepositoryError::Storage(err.to_string())
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, RepositoryError> {
    let pnr: String = row.try_get("pnr").map_err(map_sqlx)?;
    let pnr = Pnr::parse(&pnr).map_err(|e| RepositoryError::Storage(e.to_string()))?;

    let passengers: serde_json::Value = row.try_get("passengers").map_err(map_sqlx)?;
    let passengers: Vec<Passenger> =
        serde_json::from_value(passengers).map_err(|e| RepositoryError::Storage(e.to_string()))?;

    let payment_method: String = row.try_get("payment_method").map_err(map_sqlx)?;
    let payment_method: PaymentMethod =
        payment_method.parse().map_err(RepositoryError::Storage)?;

    let status: String = row.try_get("status").map_err(map_sqlx)?;
    let status: TicketStatus = status.parse().map_err(RepositoryError::Storage)?;

    Ok(Ticket {
        id: row.try_get("id").map_err(map_sqlx)?,
        pnr,
        user_id: row.try_get("user_id").map_err(map_sqlx)?,
        flight_id: row.try_get("flight_id").map_err(map_sqlx)?,
        passengers,
        total_price: row.try_get("total_price").map_err(map_sqlx)?,
        payment_method,
        miles_used: row.try_get("miles_used").map_err(map_sqlx)?,
        miles_earned: row.try_get("miles_earned").map_err(map_sqlx)?,
        membership_number: row.try_get("membership_number").map_err(map_sqlx)?,
        payment_reference: row.try_get("payment_reference").map_err(map_sqlx)?,
        status,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(map_sqlx)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(map_sqlx)?,
    })
}

#[async_trait]
impl TicketRepository for PgTicketRepository {
    async fn create(&self, ticket: &Ticket) -> Result<(), RepositoryError> {
        let passengers = serde_json::to_value(&ticket.passengers)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO tickets
                (id, pnr, user_id, flight_id, passengers, total_price,
                 payment_method, miles_used, miles_earned, membership_number,
                 payment_reference, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.pnr.as_str())
        .bind(ticket.user_id)
        .bind(ticket.flight_id)
        .bind(passengers)
        .bind(ticket.total_price)
        .bind(ticket.payment_method.to_string())
        .bind(ticket.miles_used)
        .bind(ticket.miles_earned)
        .bind(ticket.membership_number.as_deref())
        .bind(&ticket.payment_reference)
        .bind(ticket.status.to_string())
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(|r| ticket_from_row(&r)).transpose()
    }

    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Option<Ticket>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM tickets WHERE pnr = $1")
            .bind(pnr.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(|r| ticket_from_row(&r)).transpose()
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<TicketPage, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let offset = (page.max(1) - 1) as i64 * page_size as i64;
        let rows = sqlx::query(
            r#"
            SELECT * FROM tickets
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let tickets = rows
            .iter()
            .map(ticket_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TicketPage {
            tickets,
            total: total as u64,
        })
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE tickets SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to.to_string())
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
