/// The access token a proof is presented with.
///
/// `cnf_jkt` is the thumbprint from the token's confirmation claim; `None`
/// means the token is not sender-constrained, which fails the binding check.
#[derive(Debug, Clone, Copy)]
pub struct BoundAccessToken<'a> {
    pub token: &'a str,
    pub cnf_jkt: Option<&'a str>,
}

/// Result of successful DPoP verification.
#[derive(Debug, Clone)]
pub struct VerifiedDpop {
    pub jti: String,
    pub iat: i64,
    pub htm: String,
    // normalized (no query/fragment)
    pub htu: String,
    // thumbprint of the proof key
    pub jkt: String,
    pub nonce: Option<String>,
}
