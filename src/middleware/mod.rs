/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: protected resource (Bearer / DPoP) の検証
 * - http / security_headers: 全 route 共通の横断的関心事
 */
pub mod auth;
pub mod http;
pub mod security_headers;
