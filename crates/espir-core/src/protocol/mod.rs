//! JSON command protocol spoken with the companion app.
//!
//! - `messages`: command kinds, the response envelope, and every typed
//!   payload a response can carry.
//! - `request`: turning request text into a validated [`Request`].
//!
//! ```text
//! Request:  {"command":"ADD_DEVICE","parameters":{"name":"TV1","type":"television"}}
//! Response: {"status":"OK","message":"Device added successfully","timestamp":1234,
//!            "data":{"device":"TV1","type":"television"}}
//! ```

pub mod messages;
pub mod request;

pub use messages::{CommandKind, ErrorCode, Response, ResponseData, ResponseStatus};
pub use request::{parse_request, Parameters, Request, RequestError};
