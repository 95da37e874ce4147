/*
 * Responsibility
 * - middleware の公開インターフェース
 * - http: cross-cutting layers, auth: DPoP authorization
 */
pub mod auth;
pub mod http;
