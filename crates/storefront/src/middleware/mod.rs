//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with `request_id` and `username` fields)
//! 3. Request ID (reuse or generate, echo in response)
//! 4. Timeout body rewrite (JSON 408)
//! 5. Request timeout (`tower-http`)
//!
//! Authentication is not a layer: [`RequireAuth`] and [`RequireAdmin`] are
//! extractors taken by the handlers that need them.

pub mod auth;
pub mod request_id;
pub mod timeout;

pub use auth::{RequireAdmin, RequireAuth};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use timeout::{timeout_body, timeout_layer};
