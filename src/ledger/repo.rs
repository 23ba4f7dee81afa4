use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Visitante,
    Iniciado,
    Vip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tkazh_tx_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Gain,
    Spend,
    Purchase,
    Bonus,
    Reset,
}

/// Ledger-relevant slice of a user row. Accounts are created by the
/// registration flow; this service only ever mutates the credit fields.
#[derive(Debug, Clone, FromRow)]
pub struct LedgerAccount {
    pub id: Uuid,
    pub member_type: MemberType,
    pub tkazh_credits: i32,
    pub tkazh_purchased: i32,
    pub last_weekly_reset: OffsetDateTime,
    pub last_daily_bonus: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TkazhTransaction {
    pub id: i64,
    pub user_id: Uuid,
    pub kind: TxKind,
    pub amount: i32,
    pub reason: String,
    pub metadata: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct ResetOutcome {
    pub old_credits: i32,
    pub new_credits: i32,
}

pub async fn find_account(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<LedgerAccount>> {
    let account = sqlx::query_as::<_, LedgerAccount>(
        r#"
        SELECT id, member_type, tkazh_credits, tkazh_purchased, last_weekly_reset, last_daily_bonus
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(account)
}

/// Deduct `cost` only if the balance covers it, in a single conditional
/// update. Returns the new balance, or `None` when credits are short.
/// Concurrent debits serialize on the row lock, so the balance can never
/// go negative.
pub async fn try_debit<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    cost: i32,
) -> anyhow::Result<Option<i32>> {
    let balance = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE users
        SET tkazh_credits = tkazh_credits - $2
        WHERE id = $1 AND tkazh_credits >= $2
        RETURNING tkazh_credits
        "#,
    )
    .bind(user_id)
    .bind(cost)
    .fetch_optional(db)
    .await?;
    Ok(balance)
}

/// Add `amount` to the spendable balance; purchases also raise the
/// `tkazh_purchased` watermark that weekly resets restore to.
pub async fn credit<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    amount: i32,
    count_as_purchased: bool,
) -> anyhow::Result<Option<i32>> {
    let balance = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE users
        SET tkazh_credits = tkazh_credits + $2,
            tkazh_purchased = tkazh_purchased + CASE WHEN $3 THEN $2 ELSE 0 END
        WHERE id = $1
        RETURNING tkazh_credits
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(count_as_purchased)
    .fetch_optional(db)
    .await?;
    Ok(balance)
}

/// Set the balance back to the purchased floor plus the weekly grant, if a
/// week has elapsed. The elapsed-time check is part of the update predicate,
/// so concurrent readers apply the reset at most once.
pub async fn try_apply_weekly_reset<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    grant: i32,
) -> anyhow::Result<Option<ResetOutcome>> {
    let outcome = sqlx::query_as::<_, ResetOutcome>(
        r#"
        UPDATE users u
        SET tkazh_credits = u.tkazh_purchased + $2,
            last_weekly_reset = now()
        FROM (SELECT id, tkazh_credits FROM users WHERE id = $1 FOR UPDATE) prev
        WHERE u.id = prev.id
          AND u.last_weekly_reset <= now() - interval '7 days'
        RETURNING prev.tkazh_credits AS old_credits, u.tkazh_credits AS new_credits
        "#,
    )
    .bind(user_id)
    .bind(grant)
    .fetch_optional(db)
    .await?;
    Ok(outcome)
}

/// Claim the shared 24-hour clock behind the VIP bonus and the free daily
/// consultation. Concurrent claims race on the conditional update; exactly
/// one wins.
pub async fn try_claim_daily<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET last_daily_bonus = now()
        WHERE id = $1
          AND (last_daily_bonus IS NULL OR last_daily_bonus <= now() - interval '24 hours')
        "#,
    )
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_transaction<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    kind: TxKind,
    amount: i32,
    reason: &str,
    metadata: Option<serde_json::Value>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tkazh_transactions (user_id, kind, amount, reason, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .bind(amount)
    .bind(reason)
    .bind(metadata)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn history(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<TkazhTransaction>> {
    let rows = sqlx::query_as::<_, TkazhTransaction>(
        r#"
        SELECT id, user_id, kind, amount, reason, metadata, created_at
        FROM tkazh_transactions
        WHERE user_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
