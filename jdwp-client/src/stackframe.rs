// StackFrame command implementations

use crate::commands::{command_sets, stack_frame_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::read_tagged_object_id;
use crate::types::{FrameId, ObjectId, ThreadId};

impl JdwpConnection {
    /// StackFrame.ThisObject; 0 for static or native frames
    pub async fn get_this_object(&self, thread_id: ThreadId, frame_id: FrameId) -> JdwpResult<ObjectId> {
        let data = self
            .request(command_sets::STACK_FRAME, stack_frame_commands::THIS_OBJECT, |packet| {
                packet.put_id(thread_id).put_id(frame_id);
            })
            .await?;
        read_tagged_object_id(&mut data.as_slice())
    }

    /// `this` of the thread's top frame, if any
    pub async fn top_frame_this(&self, thread_id: ThreadId) -> JdwpResult<Option<ObjectId>> {
        let frames = self.get_frames(thread_id, 0, 1).await?;
        match frames.first() {
            Some(frame) => {
                let this = self.get_this_object(thread_id, frame.frame_id).await?;
                Ok((this != 0).then_some(this))
            }
            None => Ok(None),
        }
    }
}
