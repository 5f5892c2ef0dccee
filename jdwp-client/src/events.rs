// JDWP event parsing
//
// Composite event packets (Event.Composite, set 64 command 100) carry a
// suspend policy and one or more events.

use crate::commands::event_kinds;
use crate::eventrequest::SuspendPolicy;
use crate::protocol::JdwpResult;
use crate::reader::{read_count, read_i32, read_location, read_string, read_u64, read_u8};
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSet {
    pub suspend_policy: u8,
    pub events: Vec<Event>,
}

impl EventSet {
    /// True when the VM suspended every thread before sending this set
    pub fn suspends_all(&self) -> bool {
        self.suspend_policy == SuspendPolicy::All as u8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: u8,
    pub request_id: i32,
    pub details: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    VMStart {
        thread: ThreadId,
    },
    VMDeath,
    ThreadStart {
        thread: ThreadId,
    },
    ThreadDeath {
        thread: ThreadId,
    },
    ClassPrepare {
        thread: ThreadId,
        ref_type_tag: u8,
        ref_type: ReferenceTypeId,
        signature: String,
        status: i32,
    },
    Breakpoint {
        thread: ThreadId,
        location: Location,
    },
    Step {
        thread: ThreadId,
        location: Location,
    },
    Exception {
        thread: ThreadId,
        location: Location,
        exception: ObjectId,
    },
    MethodEntry {
        thread: ThreadId,
        location: Location,
    },
    Unknown {
        kind: u8,
    },
}

pub fn parse_event_packet(data: &[u8]) -> JdwpResult<EventSet> {
    let mut buf = data;

    let suspend_policy = read_u8(&mut buf)?;
    let event_count = read_count(&mut buf)?;
    let mut events = Vec::with_capacity(event_count);

    for _ in 0..event_count {
        let kind = read_u8(&mut buf)?;
        let request_id = read_i32(&mut buf)?;

        let details = match kind {
            event_kinds::BREAKPOINT => EventKind::Breakpoint {
                thread: read_u64(&mut buf)?,
                location: read_location(&mut buf)?,
            },
            event_kinds::SINGLE_STEP => EventKind::Step {
                thread: read_u64(&mut buf)?,
                location: read_location(&mut buf)?,
            },
            event_kinds::METHOD_ENTRY => EventKind::MethodEntry {
                thread: read_u64(&mut buf)?,
                location: read_location(&mut buf)?,
            },
            event_kinds::EXCEPTION => {
                let thread = read_u64(&mut buf)?;
                let location = read_location(&mut buf)?;
                let exception = crate::reader::read_tagged_object_id(&mut buf)?;
                // catch location is not needed; skip it
                let _catch = read_location(&mut buf)?;
                EventKind::Exception {
                    thread,
                    location,
                    exception,
                }
            }
            event_kinds::CLASS_PREPARE => EventKind::ClassPrepare {
                thread: read_u64(&mut buf)?,
                ref_type_tag: read_u8(&mut buf)?,
                ref_type: read_u64(&mut buf)?,
                signature: read_string(&mut buf)?,
                status: read_i32(&mut buf)?,
            },
            event_kinds::VM_START => EventKind::VMStart {
                thread: read_u64(&mut buf)?,
            },
            event_kinds::VM_DEATH => EventKind::VMDeath,
            event_kinds::THREAD_START => EventKind::ThreadStart {
                thread: read_u64(&mut buf)?,
            },
            event_kinds::THREAD_DEATH => EventKind::ThreadDeath {
                thread: read_u64(&mut buf)?,
            },
            _ => {
                // Payload layout unknown, the rest of the packet is unreadable
                warn!("Unsupported event kind: {}", kind);
                events.push(Event {
                    kind,
                    request_id,
                    details: EventKind::Unknown { kind },
                });
                break;
            }
        };

        events.push(Event {
            kind,
            request_id,
            details,
        });
    }

    Ok(EventSet {
        suspend_policy,
        events,
    })
}
