#![deny(missing_docs)]

//! # idv-client — Verification Session Protocol Client
//!
//! Runs identity verifications against the verification backend: submits
//! the captured images, advances the backend workflow, polls until the
//! session finishes, and classifies the result.
//!
//! ## Architecture
//!
//! ```text
//! JobTracker ──▶ VerificationClient ──▶ ProtocolEngine ──▶ Transport ──▶ backend
//!     │                 │                     │
//!     │                 │                     └──▶ RetryScheduler (Poll steps)
//!     └─────────────────┴──▶ ResultDispatcher ──▶ VerificationListener
//! ```
//!
//! Both backend variants (two-phase PATCH and submit-and-poll) are driven by
//! the same [`ProtocolEngine`]; everything that differs between them is in
//! [`ProtocolVariant`].
//!
//! ## Configuration
//!
//! [`IdvConfig::from_env`] reads `IDV_BASE_URL` and `IDV_API_TOKEN`
//! (required) plus optional tuning variables. Credentials are zeroized on
//! drop and never appear in `Debug` output.

pub mod classify;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod job;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod variant;
pub mod wire;

pub use client::{ClientError, VerificationClient, VerificationRequest};
pub use config::{ConfigError, IdvConfig};
pub use dispatcher::{ResultDispatcher, Subscription, VerificationListener};
pub use engine::{ProgressSink, ProtocolEngine};
pub use job::{JobSnapshot, JobTracker, RunId};
pub use scheduler::{PollReport, RetryScheduler};
pub use session::{Session, SessionError};
pub use transport::{HttpTransport, Transport, TransportError, TransportRequest};
pub use variant::{BackendStatus, ProtocolVariant, UnknownVariant, VariantKind};

pub use idv_core;
