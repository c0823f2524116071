//! Framed request dispatch for client sessions.
//!
//! Each accepted connection becomes a session. The session thread decodes one
//! request at a time, runs the named operation to completion and writes
//! exactly one response carrying the request's correlation id before reading
//! the next request. Sessions start uninitialised; `analyze` and
//! `ruleRetrieve` are refused with `uninitialized` until an `initialize`
//! succeeds on the same connection.
//!
//! | request | response |
//! |---|---|
//! | `ping` | `pong`, echoing the payload |
//! | `initialize` | `initialized` or `invalidRequest` |
//! | `analyze` | `analyzeResult`, `analyzeError`, `uninitialized` or `invalidRequest` |
//! | `ruleRetrieve` | `ruleRetrieveResult`, `ruleRetrieveError` or `uninitialized` |
//! | `quit` | `quitAck`, then service shutdown |
//! | anything else | `invalidRequest` |

mod analysis;
mod errors;
mod handler;
mod response;
mod session;

pub(crate) use self::analysis::AnalysisServices;
pub use self::errors::{AnalysisError, DispatchError, RuleRetrieveError};
pub(crate) use self::handler::DispatchConnectionHandler;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
