use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultRequest {
    pub oracle_type: String,
    pub question: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultResponse {
    pub oracle_type: String,
    pub message: String,
    pub cost: i32,
    pub balance: i32,
}

/// Returned with 402 when the balance does not cover the consultation;
/// the frontend routes the user to the credit purchase flow.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsufficientResponse {
    pub charged: bool,
    pub cost: i32,
    pub balance: i32,
    pub redirect_to: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyDrawResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
