use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub audience: String,
}

/// Credit pricing and grant sizes, injected into the ledger service.
/// Every value can be tuned through the environment without a redeploy.
#[derive(Debug, Clone, Deserialize)]
pub struct Tariff {
    pub oracle_costs: HashMap<String, i32>,
    pub default_oracle_cost: i32,
    pub weekly_grant_visitante: i32,
    pub weekly_grant_iniciado: i32,
    pub weekly_grant_vip: i32,
    pub daily_bonus: i32,
}

impl Tariff {
    pub fn oracle_cost(&self, oracle_type: &str) -> i32 {
        self.oracle_costs
            .get(oracle_type)
            .copied()
            .unwrap_or(self.default_oracle_cost)
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            oracle_costs: default_oracle_costs(),
            default_oracle_cost: 30,
            weekly_grant_visitante: 50,
            weekly_grant_iniciado: 100,
            weekly_grant_vip: 200,
            daily_bonus: 50,
        }
    }
}

fn default_oracle_costs() -> HashMap<String, i32> {
    HashMap::from([
        ("tarot".to_string(), 30),
        ("mirror".to_string(), 25),
        ("runes".to_string(), 35),
        ("fire".to_string(), 20),
        ("voice".to_string(), 40),
    ])
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub tariff: Tariff,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("SUPABASE_JWT_SECRET")?,
            audience: std::env::var("SUPABASE_JWT_AUD").unwrap_or_else(|_| "authenticated".into()),
        };
        let tariff = Tariff {
            oracle_costs: std::env::var("ORACLE_COSTS")
                .ok()
                .and_then(|v| serde_json::from_str(&v).ok())
                .unwrap_or_else(default_oracle_costs),
            default_oracle_cost: env_i32("ORACLE_DEFAULT_COST", 30),
            weekly_grant_visitante: env_i32("WEEKLY_GRANT_VISITANTE", 50),
            weekly_grant_iniciado: env_i32("WEEKLY_GRANT_INICIADO", 100),
            weekly_grant_vip: env_i32("WEEKLY_GRANT_VIP", 200),
            daily_bonus: env_i32("VIP_DAILY_BONUS", 50),
        };
        Ok(Self {
            database_url,
            jwt,
            tariff,
        })
    }
}

fn env_i32(key: &str, default: i32) -> i32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tariff_tests {
    use super::*;

    #[test]
    fn default_costs_match_the_published_table() {
        let tariff = Tariff::default();
        assert_eq!(tariff.oracle_cost("tarot"), 30);
        assert_eq!(tariff.oracle_cost("mirror"), 25);
        assert_eq!(tariff.oracle_cost("runes"), 35);
        assert_eq!(tariff.oracle_cost("fire"), 20);
        assert_eq!(tariff.oracle_cost("voice"), 40);
    }

    #[test]
    fn unknown_oracle_type_falls_back_to_default_cost() {
        let tariff = Tariff::default();
        assert_eq!(tariff.oracle_cost("pendulum"), 30);
        assert_eq!(tariff.oracle_cost(""), 30);
    }
}
