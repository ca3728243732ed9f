//! Endpoint plumbing: presets, retry, per-role model routing, token accounting.
//!
//! - [`endpoint`]: [`EndpointPreset`] resolves `openai` / `groq` / `ollama`
//!   (or any base URL) to a base URL and the environment variable holding
//!   its API key.
//! - [`retry`]: jittered exponential backoff for retryable
//!   [`EndpointError`](crate::EndpointError)s (429, 5xx, transport failures).
//! - [`router`]: [`RoleRouting`] picks the model for each solver role.
//! - [`usage`]: run IDs and the per-model [`TokenLedger`].

pub mod endpoint;
pub mod retry;
pub mod router;
pub mod usage;

pub use endpoint::EndpointPreset;
pub use retry::{RetryConfig, retry_api_call};
pub use router::RoleRouting;
pub use usage::{TokenLedger, generate_run_id};
