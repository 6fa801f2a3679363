//! forge
//!
//! The forge adapter: the engine's narrow contract over the remote
//! code-hosting service.
//!
//! # Architecture
//!
//! The engine sees the forge only through the [`Forge`] trait: PR
//! create/update, batched PR-state queries, draft transitions, comment
//! CRUD, and the browser hand-off. The production implementation is
//! [`github::GitHubForge`]; tests use [`mock::MockForge`].
//!
//! Adapters are invoked only after local invariants are satisfied, and
//! their results land only in cached metadata fields. A forge failure
//! never corrupts local state.

pub mod github;
pub mod mock;
pub mod traits;

pub use traits::{
    Comment, CreatePrRequest, Forge, ForgeError, PrStatus, PullRequest, RepoIdentity,
    UpdatePrRequest,
};
