use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SERVICE_ROLE: &str = "service_role";

/// Payload of a Supabase-issued JWT. Tokens are only verified here, never
/// issued; registration and login live entirely in the auth provider.
///
/// User access tokens carry `sub` and `aud = "authenticated"`; service-role
/// keys carry `role = "service_role"` and no subject or audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Option<Uuid>, // user ID; absent on service-role keys
    #[serde(default)]
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: usize, // expires at (unix timestamp)
}

impl Claims {
    pub fn is_service(&self) -> bool {
        self.role == SERVICE_ROLE
    }
}

/// Verify a user access token, enforcing the configured audience.
pub fn decode_user(
    token: &str,
    secret: &str,
    audience: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_audience(std::slice::from_ref(&audience));
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Verify a service-role key. Supabase service keys carry no audience,
/// so only signature and expiry are checked; the caller checks the role.
pub fn decode_service(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::default();
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}
