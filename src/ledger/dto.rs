use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::TxKind;
use super::service::CreditsSummary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub current: i32,
    pub purchased: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_weekly_reset: OffsetDateTime,
    pub can_use_daily: bool,
}

impl From<CreditsSummary> for BalanceResponse {
    fn from(s: CreditsSummary) -> Self {
        Self {
            current: s.current,
            purchased: s.purchased,
            last_weekly_reset: s.last_weekly_reset,
            can_use_daily: s.can_use_daily,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendRequest {
    pub oracle_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendResponse {
    pub charged: bool,
    pub cost: i32,
    pub balance: i32,
}

/// Grant kinds a service-role caller may record; debit kinds are not
/// accepted on this path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantKind {
    #[default]
    Gain,
    Purchase,
    Bonus,
}

impl From<GrantKind> for TxKind {
    fn from(kind: GrantKind) -> Self {
        match kind {
            GrantKind::Gain => TxKind::Gain,
            GrantKind::Purchase => TxKind::Purchase,
            GrantKind::Bonus => TxKind::Bonus,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub user_id: Uuid,
    pub amount: i32,
    pub reason: String,
    #[serde(default)]
    pub kind: GrantKind,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    pub balance: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBonusResponse {
    pub granted: bool,
    pub amount: i32,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostsResponse {
    pub costs: HashMap<String, i32>,
    pub default_cost: i32,
}
