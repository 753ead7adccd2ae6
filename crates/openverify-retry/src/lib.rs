//! Redirect retry controller with cache-backed target verification.
//!
//! When an open is redirected to another server, this crate decides whether
//! to trust the redirect: it consults the shared
//! [`openverify_cache::VerifyCache`] for a memoized verdict, falls back to
//! an expensive reachability probe on a miss, and loops over further
//! redirects up to a bounded number of attempts while reporting
//! already-rejected targets back to the server.
//!
//! - [`outcome`] models open modes, redirect targets, and the four outcome
//!   classes the controller interprets (plus the bypass policy for
//!   write-intent opens).
//! - [`opaque`] handles the query-string-shaped auxiliary blob threaded
//!   through to the storage layer, including tried-target merging.
//! - [`token`] discovers a bearer token in connection credentials or the
//!   opaque blob, handed to the probe as an explicit parameter.
//! - [`controller`] is the retry state machine itself, with the
//!   [`controller::RemoteOpen`] and [`controller::TargetProbe`] collaborator
//!   traits at the boundary.
//! - [`config`] carries the TOML-backed TTL/retry tuning.

pub mod config;
pub mod controller;
pub mod opaque;
pub mod outcome;
pub mod token;

pub use config::{RetryPolicy, VerifyConfig};
pub use controller::{RemoteOpen, RetryController, TargetProbe};
pub use opaque::OpaqueData;
pub use outcome::{OpenMode, OpenOutcome, RedirectTarget};
pub use token::extract_token;
