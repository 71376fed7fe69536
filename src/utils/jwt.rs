use base64::Engine as _;
use serde_json::Value;

/// Decode the payload JSON ("claims") from a JWT.
///
/// Signature-agnostic: the payload segment is base64url-decoded and parsed, nothing is verified.
pub(crate) fn decode_jwt_claims(jwt: &str) -> Option<Value> {
    let mut segments = jwt.split('.');
    let (_header, payload_b64, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    // Most JWTs are base64url without padding, but some toolchains include it.
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(payload_b64))
        .ok()?;

    serde_json::from_slice(&bytes).ok()
}

/// `exp` claim of a JWT, in unix seconds.
pub(crate) fn jwt_expiry(jwt: &str) -> Option<i64> {
    decode_jwt_claims(jwt)?.get("exp").and_then(Value::as_i64)
}


#[cfg(test)]
mod tests {
    use super::test_support::make_jwt;
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_unpadded_payload() {
        let jwt = make_jwt(&json!({ "sub": "u1", "exp": 1_900_000_000 }));
        let claims = decode_jwt_claims(&jwt).expect("claims");
        assert_eq!(claims["sub"], "u1");
        assert_eq!(jwt_expiry(&jwt), Some(1_900_000_000));
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(decode_jwt_claims("only.two").is_none());
        assert!(decode_jwt_claims("a.b.c.d").is_none());
        assert!(decode_jwt_claims("not-a-jwt").is_none());
    }

    #[test]
    fn rejects_non_json_payload() {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"plain text");
        assert!(decode_jwt_claims(&format!("h.{payload}.s")).is_none());
    }
}
