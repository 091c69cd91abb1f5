//! Harbor PKI - local certificate authority and trust-store synchronization
//!
//! This crate owns the TLS material a Harbor registry deployment serves with:
//! a long-lived self-signed root, leaf certificates signed by it, and the
//! installation of that root into the operating system's trust store.
//!
//! The command surface lives in the `harbor-ops` binary.

pub mod authority;
pub mod config;
pub mod engine;
pub mod error;
pub mod inspect;
pub mod layout;
pub mod san;
pub mod trust;
pub mod workflow;

pub use authority::{
    AuthorityStatus, CertificateAuthority, IssuedServerCert, RootOutcome, ServerRequest,
    SlotStatus,
};
pub use config::{CaConfig, TrustConfig};
pub use engine::{CryptoEngine, OpensslEngine};
pub use error::{PkiError, Result};
pub use inspect::{CertSummary, Fingerprint};
pub use layout::KeyMaterialStore;
pub use san::{SanList, SubjectAltName};
pub use workflow::{LeafOutcome, WorkflowReport};
