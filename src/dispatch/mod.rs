//! Request dispatch: per-request context, the lifecycle state machine and error pages.

pub mod context;
pub mod dispatcher;
pub mod error_page;

pub use context::{ActionContext, DispatchContext, DispatchState, Request, Response, TransportRequest};
pub use dispatcher::{DispatchResponse, Dispatcher};
pub use error_page::ErrorKind;
