//! aifree daemon: the session state machine and the process that serves it.
//!
//! The runtime owns one [`SessionStore`] and answers line-delimited JSON
//! commands on `~/.aifree/daemon.sock`.

pub mod clock;
mod error;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DaemonError;
pub use protocol::{
    request, request_blocklist, request_logs, request_shutdown, request_status, send_request,
    Request, Response,
};
pub use runtime::{run, start_blocking};
pub use session::{Recovery, SessionError, SessionStore};
