use anyhow::Context;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Tariff;

use super::repo::{self, LedgerAccount, MemberType, TkazhTransaction, TxKind};

const HISTORY_MAX_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("user not found")]
    UserNotFound,
    #[error("amount must be positive")]
    InvalidAmount,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Outcome of a spend attempt. Running out of credits is an expected
/// outcome the caller branches on, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendOutcome {
    Charged { cost: i32, balance: i32 },
    InsufficientCredits { cost: i32, balance: i32 },
}

#[derive(Debug, Clone)]
pub struct CreditsSummary {
    pub current: i32,
    pub purchased: i32,
    pub last_weekly_reset: OffsetDateTime,
    pub can_use_daily: bool,
}

/// Current balance for a user, applying the lazy weekly reset first if one
/// is due.
pub async fn get_user_credits(
    db: &PgPool,
    tariff: &Tariff,
    user_id: Uuid,
) -> Result<CreditsSummary, LedgerError> {
    let account = load_account(db, user_id).await?;
    let account = apply_weekly_reset_if_due(db, tariff, account).await?;
    Ok(CreditsSummary {
        current: account.tkazh_credits,
        purchased: account.tkazh_purchased,
        last_weekly_reset: account.last_weekly_reset,
        can_use_daily: can_use_daily(&account),
    })
}

/// Charge the cost of an oracle consultation. The balance check and the
/// deduction are one conditional update inside the same transaction as the
/// audit row, so concurrent spends cannot overdraw the account.
pub async fn spend_credits(
    db: &PgPool,
    tariff: &Tariff,
    user_id: Uuid,
    oracle_type: &str,
) -> Result<SpendOutcome, LedgerError> {
    let account = load_account(db, user_id).await?;
    let account = apply_weekly_reset_if_due(db, tariff, account).await?;
    let cost = tariff.oracle_cost(oracle_type);

    let mut tx = db.begin().await.context("begin transaction")?;
    match repo::try_debit(&mut *tx, user_id, cost).await? {
        Some(balance) => {
            repo::insert_transaction(
                &mut *tx,
                user_id,
                TxKind::Spend,
                -cost,
                &format!("oracle consultation: {oracle_type}"),
                Some(serde_json::json!({ "oracleType": oracle_type })),
            )
            .await?;
            tx.commit().await.context("commit transaction")?;
            debug!(user_id = %user_id, cost, balance, "credits debited");
            Ok(SpendOutcome::Charged { cost, balance })
        }
        None => {
            tx.rollback().await.context("rollback transaction")?;
            Ok(SpendOutcome::InsufficientCredits {
                cost,
                balance: account.tkazh_credits,
            })
        }
    }
}

/// Grant credits. Amounts must be strictly positive; the ledger has no
/// uncontrolled debit path. Purchases also raise the non-resettable
/// `tkazh_purchased` watermark.
pub async fn add_credits(
    db: &PgPool,
    user_id: Uuid,
    amount: i32,
    reason: &str,
    kind: TxKind,
    metadata: Option<serde_json::Value>,
) -> Result<i32, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount);
    }

    let mut tx = db.begin().await.context("begin transaction")?;
    let balance = repo::credit(&mut *tx, user_id, amount, kind == TxKind::Purchase)
        .await?
        .ok_or(LedgerError::UserNotFound)?;
    repo::insert_transaction(&mut *tx, user_id, kind, amount, reason, metadata).await?;
    tx.commit().await.context("commit transaction")?;

    info!(user_id = %user_id, amount, kind = ?kind, balance, "credits added");
    Ok(balance)
}

/// Once-per-24-hours credit grant for VIP members. Returns `false` for
/// non-VIPs and when the bonus was already claimed today.
pub async fn give_vip_daily_bonus(
    db: &PgPool,
    tariff: &Tariff,
    user_id: Uuid,
) -> Result<bool, LedgerError> {
    let account = load_account(db, user_id).await?;
    if account.member_type != MemberType::Vip {
        return Ok(false);
    }

    let mut tx = db.begin().await.context("begin transaction")?;
    if !repo::try_claim_daily(&mut *tx, user_id).await? {
        tx.rollback().await.context("rollback transaction")?;
        return Ok(false);
    }
    let balance = repo::credit(&mut *tx, user_id, tariff.daily_bonus, false)
        .await?
        .ok_or(LedgerError::UserNotFound)?;
    repo::insert_transaction(
        &mut *tx,
        user_id,
        TxKind::Bonus,
        tariff.daily_bonus,
        "vip daily bonus",
        None,
    )
    .await?;
    tx.commit().await.context("commit transaction")?;

    info!(user_id = %user_id, amount = tariff.daily_bonus, balance, "vip daily bonus granted");
    Ok(true)
}

/// Claim the free daily consultation. Shares the 24-hour clock with the VIP
/// bonus and grants no credits.
pub async fn claim_free_daily(db: &PgPool, user_id: Uuid) -> Result<bool, LedgerError> {
    load_account(db, user_id).await?;
    let claimed = repo::try_claim_daily(db, user_id).await?;
    if claimed {
        debug!(user_id = %user_id, "free daily consultation claimed");
    }
    Ok(claimed)
}

pub async fn transaction_history(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<TkazhTransaction>, LedgerError> {
    load_account(db, user_id).await?;
    let rows = repo::history(db, user_id, limit.clamp(1, HISTORY_MAX_LIMIT)).await?;
    Ok(rows)
}

async fn load_account(db: &PgPool, user_id: Uuid) -> Result<LedgerAccount, LedgerError> {
    repo::find_account(db, user_id)
        .await?
        .ok_or(LedgerError::UserNotFound)
}

/// Resets are lazy: applied on the next read once a week has elapsed, not by
/// a background job. The conditional update in the repo keeps concurrent
/// readers from applying it twice.
async fn apply_weekly_reset_if_due(
    db: &PgPool,
    tariff: &Tariff,
    account: LedgerAccount,
) -> Result<LedgerAccount, LedgerError> {
    if OffsetDateTime::now_utc() - account.last_weekly_reset < Duration::weeks(1) {
        return Ok(account);
    }

    let grant = weekly_grant(tariff, account.member_type);
    let mut tx = db.begin().await.context("begin transaction")?;
    match repo::try_apply_weekly_reset(&mut *tx, account.id, grant).await? {
        Some(reset) => {
            repo::insert_transaction(
                &mut *tx,
                account.id,
                TxKind::Reset,
                reset.new_credits - reset.old_credits,
                "weekly reset",
                None,
            )
            .await?;
            tx.commit().await.context("commit transaction")?;
            info!(user_id = %account.id, credits = reset.new_credits, grant, "weekly reset applied");
        }
        None => {
            // Lost the race to a concurrent request; its reset counts.
            tx.rollback().await.context("rollback transaction")?;
        }
    }

    load_account(db, account.id).await
}

fn weekly_grant(tariff: &Tariff, member: MemberType) -> i32 {
    match member {
        MemberType::Visitante => tariff.weekly_grant_visitante,
        MemberType::Iniciado => tariff.weekly_grant_iniciado,
        MemberType::Vip => tariff.weekly_grant_vip,
    }
}

fn can_use_daily(account: &LedgerAccount) -> bool {
    match account.last_daily_bonus {
        None => true,
        Some(last) => OffsetDateTime::now_utc() - last >= Duration::hours(24),
    }
}


#[cfg(test)]
mod ledger_db_tests {
    use super::*;
    use sqlx::PgPool;

    async fn create_user(db: &PgPool, member: MemberType, credits: i32, purchased: i32) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (member_type, tkazh_credits, tkazh_purchased)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(member)
        .bind(credits)
        .bind(purchased)
        .fetch_one(db)
        .await
        .expect("create user")
    }

    async fn backdate_weekly_reset(db: &PgPool, user_id: Uuid, days: i32) {
        sqlx::query(
            "UPDATE users SET last_weekly_reset = now() - make_interval(days => $2) WHERE id = $1",
        )
        .bind(user_id)
        .bind(days)
        .execute(db)
        .await
        .expect("backdate reset");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_user_is_reported(pool: PgPool) {
        let tariff = Tariff::default();
        let err = get_user_credits(&pool, &tariff, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn spend_is_denied_when_balance_is_short(pool: PgPool) {
        let tariff = Tariff::default();
        let user_id = create_user(&pool, MemberType::Iniciado, 29, 0).await;

        let outcome = spend_credits(&pool, &tariff, user_id, "tarot")
            .await
            .expect("spend");
        assert_eq!(
            outcome,
            SpendOutcome::InsufficientCredits {
                cost: 30,
                balance: 29
            }
        );

        let summary = get_user_credits(&pool, &tariff, user_id).await.expect("summary");
        assert_eq!(summary.current, 29);

        let rows = transaction_history(&pool, user_id, 20).await.expect("history");
        assert!(rows.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn spend_deducts_and_logs_one_transaction(pool: PgPool) {
        let tariff = Tariff::default();
        let user_id = create_user(&pool, MemberType::Iniciado, 50, 0).await;

        let outcome = spend_credits(&pool, &tariff, user_id, "fire")
            .await
            .expect("spend");
        assert_eq!(
            outcome,
            SpendOutcome::Charged {
                cost: 20,
                balance: 30
            }
        );

        let rows = transaction_history(&pool, user_id, 20).await.expect("history");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, TxKind::Spend);
        assert_eq!(rows[0].amount, -20);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_spends_cannot_overdraw(pool: PgPool) {
        let tariff = Tariff::default();
        let user_id = create_user(&pool, MemberType::Iniciado, 50, 0).await;

        // 50 credits cover exactly one tarot consultation (30).
        let (a, b) = tokio::join!(
            spend_credits(&pool, &tariff, user_id, "tarot"),
            spend_credits(&pool, &tariff, user_id, "tarot"),
        );
        let outcomes = [a.expect("spend a"), b.expect("spend b")];

        let charged = outcomes
            .iter()
            .filter(|o| matches!(o, SpendOutcome::Charged { .. }))
            .count();
        assert_eq!(charged, 1);

        let summary = get_user_credits(&pool, &tariff, user_id).await.expect("summary");
        assert_eq!(summary.current, 20);

        let rows = transaction_history(&pool, user_id, 20).await.expect("history");
        assert_eq!(rows.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn weekly_reset_restores_the_free_allotment(pool: PgPool) {
        let tariff = Tariff::default();
        let user_id = create_user(&pool, MemberType::Vip, 10, 40).await;
        backdate_weekly_reset(&pool, user_id, 8).await;

        let summary = get_user_credits(&pool, &tariff, user_id).await.expect("summary");
        assert_eq!(summary.current, 40 + 200);
        assert_eq!(summary.purchased, 40);

        let rows = transaction_history(&pool, user_id, 20).await.expect("history");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, TxKind::Reset);
        assert_eq!(rows[0].amount, 230);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn weekly_reset_applies_once_per_week(pool: PgPool) {
        let tariff = Tariff::default();
        let user_id = create_user(&pool, MemberType::Visitante, 5, 0).await;
        backdate_weekly_reset(&pool, user_id, 10).await;

        let first = get_user_credits(&pool, &tariff, user_id).await.expect("summary");
        assert_eq!(first.current, 50);

        // Repeated reads within the same week leave the balance alone.
        let second = get_user_credits(&pool, &tariff, user_id).await.expect("summary");
        assert_eq!(second.current, 50);

        let rows = transaction_history(&pool, user_id, 20).await.expect("history");
        let resets = rows.iter().filter(|t| t.kind == TxKind::Reset).count();
        assert_eq!(resets, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn purchase_grants_raise_the_reset_floor(pool: PgPool) {
        let tariff = Tariff::default();
        let user_id = create_user(&pool, MemberType::Visitante, 50, 0).await;

        let balance = add_credits(
            &pool,
            user_id,
            100,
            "grimoire purchase",
            TxKind::Purchase,
            None,
        )
        .await
        .expect("purchase");
        assert_eq!(balance, 150);

        let outcome = spend_credits(&pool, &tariff, user_id, "fire")
            .await
            .expect("spend");
        assert_eq!(
            outcome,
            SpendOutcome::Charged {
                cost: 20,
                balance: 130
            }
        );

        backdate_weekly_reset(&pool, user_id, 8).await;
        let summary = get_user_credits(&pool, &tariff, user_id).await.expect("summary");
        // Purchased credits survive the reset; the spend did not touch the floor.
        assert_eq!(summary.purchased, 100);
        assert_eq!(summary.current, 100 + 50);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn grants_must_be_positive(pool: PgPool) {
        let user_id = create_user(&pool, MemberType::Iniciado, 40, 0).await;

        for amount in [0, -5] {
            let err = add_credits(&pool, user_id, amount, "oops", TxKind::Gain, None)
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount));
        }

        let rows = transaction_history(&pool, user_id, 20).await.expect("history");
        assert!(rows.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn vip_daily_bonus_once_per_day(pool: PgPool) {
        let tariff = Tariff::default();
        let vip = create_user(&pool, MemberType::Vip, 0, 0).await;

        assert!(give_vip_daily_bonus(&pool, &tariff, vip).await.expect("bonus"));
        assert!(!give_vip_daily_bonus(&pool, &tariff, vip).await.expect("bonus"));

        let summary = get_user_credits(&pool, &tariff, vip).await.expect("summary");
        assert_eq!(summary.current, tariff.daily_bonus);
        assert!(!summary.can_use_daily);

        let rows = transaction_history(&pool, vip, 20).await.expect("history");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, TxKind::Bonus);
        assert_eq!(rows[0].amount, tariff.daily_bonus);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn daily_bonus_denied_to_non_vips(pool: PgPool) {
        let tariff = Tariff::default();
        let member = create_user(&pool, MemberType::Iniciado, 0, 0).await;

        assert!(!give_vip_daily_bonus(&pool, &tariff, member).await.expect("bonus"));

        let summary = get_user_credits(&pool, &tariff, member).await.expect("summary");
        assert_eq!(summary.current, 0);
        // The clock was not consumed by the refused attempt.
        assert!(summary.can_use_daily);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn free_daily_consultation_shares_the_bonus_clock(pool: PgPool) {
        let tariff = Tariff::default();
        let vip = create_user(&pool, MemberType::Vip, 0, 0).await;

        assert!(claim_free_daily(&pool, vip).await.expect("claim"));
        assert!(!claim_free_daily(&pool, vip).await.expect("claim"));
        assert!(!give_vip_daily_bonus(&pool, &tariff, vip).await.expect("bonus"));

        let summary = get_user_credits(&pool, &tariff, vip).await.expect("summary");
        assert!(!summary.can_use_daily);
        assert_eq!(summary.current, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn history_is_newest_first_and_limited(pool: PgPool) {
        let user_id = create_user(&pool, MemberType::Iniciado, 0, 0).await;

        for (amount, reason) in [(10, "first"), (20, "second"), (30, "third")] {
            add_credits(&pool, user_id, amount, reason, TxKind::Gain, None)
                .await
                .expect("grant");
        }

        let rows = transaction_history(&pool, user_id, 2).await.expect("history");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].reason, "third");
        assert_eq!(rows[1].reason, "second");
    }
}
