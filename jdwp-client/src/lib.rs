// JDWP client library for heap inspection
//
// Implements the subset of the JDWP protocol a memory view needs:
// - Connection management and the async reply/event loop
// - Class enumeration and per-class instance counts
// - Live instance listing
// - Class-prepare and constructor-entry event requests
// - VM suspend/resume

pub mod connection;
pub mod protocol;
pub mod commands;
pub mod events;
pub mod types;
pub mod reader;
pub mod vm;
pub mod reftype;
pub mod eventrequest;
pub mod eventloop;
pub mod thread;
pub mod stackframe;

pub use connection::JdwpConnection;
pub use eventrequest::SuspendPolicy;
pub use events::{Event, EventKind, EventSet};
pub use protocol::{JdwpError, JdwpResult};
pub use types::{ClassInfo, Location, ObjectId, ReferenceTypeId, ThreadId};
