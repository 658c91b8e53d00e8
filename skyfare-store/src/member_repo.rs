use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyfare_core::member::LoyaltyMember;
use skyfare_core::repository::{MemberRepository, RepositoryError};
use skyfare_shared::Tier;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Postgres loyalty-member store. The ledger serializes mutations per
/// member; this layer just persists snapshots and the applied credit keys.
pub struct PgMemberRepository {
    pool: PgPool,
}

impl PgMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx(err: sqlx::Error) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            return RepositoryError::Duplicate(db_err.message().to_string());
        }
    }
    RepositoryError::Storage(err.to_string())
}

fn member_from_row(row: &PgRow) -> Result<LoyaltyMember, RepositoryError> {
    let tier: String = row.try_get("tier").map_err(map_sqlx)?;
    let tier: Tier = tier.parse().map_err(RepositoryError::Storage)?;

    Ok(LoyaltyMember {
        user_id: row.try_get("user_id").map_err(map_sqlx)?,
        membership_number: row.try_get("membership_number").map_err(map_sqlx)?,
        total_miles: row.try_get("total_miles").map_err(map_sqlx)?,
        available_miles: row.try_get("available_miles").map_err(map_sqlx)?,
        tier,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(map_sqlx)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(map_sqlx)?,
    })
}

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<LoyaltyMember>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM loyalty_members WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(|r| member_from_row(&r)).transpose()
    }

    async fn find_by_user_and_number(
        &self,
        user_id: Uuid,
        membership_number: &str,
    ) -> Result<Option<LoyaltyMember>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM loyalty_members WHERE user_id = $1 AND membership_number = $2",
        )
        .bind(user_id)
        .bind(membership_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(|r| member_from_row(&r)).transpose()
    }

    async fn save(
        &self,
        member: &LoyaltyMember,
        applied_key: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO loyalty_members
                (user_id, membership_number, total_miles, available_miles,
                 tier, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                total_miles = EXCLUDED.total_miles,
                available_miles = EXCLUDED.available_miles,
                tier = EXCLUDED.tier,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(member.user_id)
        .bind(&member.membership_number)
        .bind(member.total_miles)
        .bind(member.available_miles)
        .bind(member.tier.to_string())
        .bind(member.created_at)
        .bind(member.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        if let Some(key) = applied_key {
            sqlx::query(
                r#"
                INSERT INTO loyalty_credit_keys (user_id, idempotency_key, applied_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(member.user_id)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn key_applied(&self, user_id: Uuid, key: &str) -> Result<bool, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM loyalty_credit_keys WHERE user_id = $1 AND idempotency_key = $2",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.is_some())
    }
}
