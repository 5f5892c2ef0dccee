// ThreadReference command implementations

use crate::commands::{command_sets, thread_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::{read_count, read_location, read_u64};
use crate::types::{FrameId, Location, ThreadId};
use serde::{Deserialize, Serialize};

/// Stack frame information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: FrameId,
    pub location: Location,
}

impl JdwpConnection {
    /// ThreadReference.Frames; `length` of -1 means all remaining frames
    pub async fn get_frames(
        &self,
        thread_id: ThreadId,
        start_frame: i32,
        length: i32,
    ) -> JdwpResult<Vec<Frame>> {
        let data = self
            .request(command_sets::THREAD_REFERENCE, thread_commands::FRAMES, |packet| {
                packet.put_id(thread_id).put_i32(start_frame).put_i32(length);
            })
            .await?;

        let mut data = data.as_slice();
        let count = read_count(&mut data)?;
        let mut frames = Vec::with_capacity(count);

        for _ in 0..count {
            frames.push(Frame {
                frame_id: read_u64(&mut data)?,
                location: read_location(&mut data)?,
            });
        }

        Ok(frames)
    }

    /// ThreadReference.Resume for a single thread
    pub async fn resume_thread(&self, thread_id: ThreadId) -> JdwpResult<()> {
        self.request(command_sets::THREAD_REFERENCE, thread_commands::RESUME, |packet| {
            packet.put_id(thread_id);
        })
        .await?;
        Ok(())
    }
}
