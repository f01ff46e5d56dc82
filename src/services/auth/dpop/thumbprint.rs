//! RFC 7638 JWK thumbprints and RFC 9449 access-token hashes.
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk};
use sha2::{Digest, Sha256};

use crate::services::auth::dpop::core::DpopError;

/// base64url(SHA-256(access_token)), the `ath` claim of a DPoP proof.
pub fn compute_ath(access_token: &str) -> String {
    let digest = Sha256::digest(access_token.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn ec_curve_name(curve: &EllipticCurve) -> Option<&'static str> {
    // `EllipticCurve` does not implement Display, so match explicitly.
    match curve {
        EllipticCurve::P256 => Some("P-256"),
        EllipticCurve::P384 => Some("P-384"),
        EllipticCurve::P521 => Some("P-521"),
        _ => None,
    }
}

/// SHA-256 JWK thumbprint (base64url), suitable for comparison with `cnf.jkt`.
///
/// The canonical JSON holds only the required members in lexicographic order,
/// with no whitespace.
pub fn compute_jwk_thumbprint(jwk: &Jwk) -> Result<String, DpopError> {
    let canonical = match &jwk.algorithm {
        AlgorithmParameters::OctetKeyPair(params) => match params.curve {
            EllipticCurve::Ed25519 => format!(
                "{{\"crv\":\"Ed25519\",\"kty\":\"OKP\",\"x\":\"{}\"}}",
                params.x
            ),
            _ => return Err(DpopError::UnsupportedJwk),
        },
        AlgorithmParameters::EllipticCurve(params) => {
            let crv = ec_curve_name(&params.curve).ok_or(DpopError::UnsupportedJwk)?;
            format!(
                "{{\"crv\":\"{}\",\"kty\":\"EC\",\"x\":\"{}\",\"y\":\"{}\"}}",
                crv, params.x, params.y
            )
        }
        AlgorithmParameters::RSA(params) => format!(
            "{{\"e\":\"{}\",\"kty\":\"RSA\",\"n\":\"{}\"}}",
            params.e, params.n
        ),
        // Symmetric keys can't prove possession to a third party.
        _ => return Err(DpopError::UnsupportedJwk),
    };

    let digest = Sha256::digest(canonical.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rsa_thumbprint_matches_rfc7638_example() {
        let jwk: Jwk = serde_json::from_value(json!({
            "kty": "RSA",
            "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
            "e": "AQAB",
            "alg": "RS256",
            "kid": "2011-04-29"
        }))
        .unwrap();

        assert_eq!(
            compute_jwk_thumbprint(&jwk).unwrap(),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    #[test]
    fn optional_members_do_not_change_thumbprint() {
        let bare: Jwk = serde_json::from_value(json!({
            "kty": "OKP", "crv": "Ed25519", "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"
        }))
        .unwrap();
        let decorated: Jwk = serde_json::from_value(json!({
            "kty": "OKP", "crv": "Ed25519", "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo",
            "kid": "client-key-1", "use": "sig"
        }))
        .unwrap();

        assert_eq!(
            compute_jwk_thumbprint(&bare).unwrap(),
            compute_jwk_thumbprint(&decorated).unwrap()
        );
    }

    #[test]
    fn symmetric_keys_are_rejected() {
        let jwk: Jwk = serde_json::from_value(json!({ "kty": "oct", "k": "c2VjcmV0" })).unwrap();
        assert!(matches!(
            compute_jwk_thumbprint(&jwk),
            Err(DpopError::UnsupportedJwk)
        ));
    }

    #[test]
    fn ath_is_base64url_sha256() {
        // SHA-256("abc")
        assert_eq!(
            compute_ath("abc"),
            "ungWv48Bz-pBQUDeXa4iI7ADYaOWF3qctBD_YfIAFa0"
        );
    }
}
