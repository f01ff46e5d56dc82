/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 */

use crate::services::claims::Claims;

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `subject` は token の `sub` (client credentials token では無い)
/// - `scopes` は coarse-grained な権限情報
/// - `jti` は監査/相関用
/// - `dpop_jkt` は DPoP scheme で検証済みの鍵指紋。Bearer では `None`
/// - `claims` は protocol claim を除いた残り
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub subject: Option<String>,
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
    pub jti: Option<String>,
    pub dpop_jkt: Option<String>,
    pub claims: Claims,
}
