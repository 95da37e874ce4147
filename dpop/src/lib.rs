//! DPoP (RFC 9449) proof construction and verification.
//!
//! - `builder`: key holders sign proofs (`ProofBuilder`, `KeyHolder`)
//! - `core`: receivers verify proofs against the request (`ProofVerifier`)
//!
//! Nothing in here knows about HTTP frameworks, caches or introspection;
//! those live in the resource server.

pub mod builder;
pub mod core;
pub mod error;
pub mod htu;
pub mod jwk;
pub mod key;
pub mod types;

pub use builder::{KeyHolder, ProofBuilder};
pub use core::{ASYMMETRIC_ALGORITHMS, DpopPolicy, ProofContext, ProofVerifier};
pub use error::{BuildError, DpopError};
pub use jwk::{compute_ath, jwk_thumbprint};
pub use key::Ed25519KeyHolder;
pub use types::{DPOP_TYP, ProofClaims, ProofHeader, VerifiedProof};
