use crate::error::BridgeError;
use crate::utils::jwt::decode_jwt_claims;
use serde_json::Value;

const AUTH_CLAIM: &str = "https://api.openai.com/auth";
const ACCOUNT_ID_FIELD: &str = "chatgpt_account_id";

/// Read the ChatGPT account id out of an access token's claims.
///
/// The backend rejects requests without it, so any failure here is a hard error.
pub(crate) fn account_id_from_access_token(access_token: &str) -> Result<String, BridgeError> {
    let claims = decode_jwt_claims(access_token).ok_or_else(|| {
        BridgeError::AuthToken("failed to decode access token claims".to_string())
    })?;

    claims
        .get(AUTH_CLAIM)
        .and_then(Value::as_object)
        .and_then(|o| o.get(ACCOUNT_ID_FIELD))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            BridgeError::AuthToken(format!(
                "missing {AUTH_CLAIM}.{ACCOUNT_ID_FIELD} in access token claims"
            ))
        })
}
