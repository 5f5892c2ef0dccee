// EventRequest command implementations
//
// Class-prepare notifications and constructor entry hooks

use crate::commands::{command_sets, event_commands, event_kinds, modifier_kinds};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpResult};
use crate::reader::read_i32;
use crate::types::ReferenceTypeId;

/// Suspend policy for events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SuspendPolicy {
    None = 0,
    EventThread = 1,
    All = 2,
}

/// Event request modifiers we send
#[derive(Debug, Clone)]
pub enum EventModifier {
    Count(i32),
    ClassOnly(ReferenceTypeId),
    ClassMatch(String),
}

impl EventModifier {
    fn encode(&self, packet: &mut CommandPacket) {
        match self {
            EventModifier::Count(count) => {
                packet.put_u8(modifier_kinds::COUNT).put_i32(*count);
            }
            EventModifier::ClassOnly(ref_type) => {
                packet.put_u8(modifier_kinds::CLASS_ONLY).put_id(*ref_type);
            }
            EventModifier::ClassMatch(pattern) => {
                packet.put_u8(modifier_kinds::CLASS_MATCH).put_string(pattern);
            }
        }
    }
}

impl JdwpConnection {
    /// EventRequest.Set; returns the request ID
    pub async fn set_event_request(
        &self,
        event_kind: u8,
        suspend_policy: SuspendPolicy,
        modifiers: &[EventModifier],
    ) -> JdwpResult<i32> {
        let data = self
            .request(command_sets::EVENT_REQUEST, event_commands::SET, |packet| {
                packet
                    .put_u8(event_kind)
                    .put_u8(suspend_policy as u8)
                    .put_i32(modifiers.len() as i32);
                for modifier in modifiers {
                    modifier.encode(packet);
                }
            })
            .await?;

        read_i32(&mut data.as_slice())
    }

    /// EventRequest.Clear
    pub async fn clear_event_request(&self, event_kind: u8, request_id: i32) -> JdwpResult<()> {
        self.request(command_sets::EVENT_REQUEST, event_commands::CLEAR, |packet| {
            packet.put_u8(event_kind).put_i32(request_id);
        })
        .await?;
        Ok(())
    }

    /// Ask for a one-shot ClassPrepare event for classes matching `class_pattern`
    ///
    /// The pattern uses JDWP ClassMatch syntax (`com.example.Foo`, `com.example.*`).
    /// Only the preparing thread is suspended.
    pub async fn request_class_prepare(&self, class_pattern: &str) -> JdwpResult<i32> {
        self.set_event_request(
            event_kinds::CLASS_PREPARE,
            SuspendPolicy::EventThread,
            &[
                EventModifier::ClassMatch(class_pattern.to_string()),
                EventModifier::Count(1),
            ],
        )
        .await
    }

    /// Ask for MethodEntry events for every method of `class_id`
    pub async fn request_method_entry(&self, class_id: ReferenceTypeId) -> JdwpResult<i32> {
        self.set_event_request(
            event_kinds::METHOD_ENTRY,
            SuspendPolicy::EventThread,
            &[EventModifier::ClassOnly(class_id)],
        )
        .await
    }
}
