// ReferenceType command implementations
//
// Per-class queries: signature, methods and live instances

use crate::commands::{command_sets, reference_type_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::{read_count, read_i32, read_string, read_tagged_object_id, read_u64};
use crate::types::{MethodId, ObjectId, ReferenceTypeId};
use serde::{Deserialize, Serialize};

/// Method information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInfo {
    pub method_id: MethodId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

impl MethodInfo {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

impl JdwpConnection {
    /// ReferenceType.Signature
    pub async fn get_signature(&self, ref_type_id: ReferenceTypeId) -> JdwpResult<String> {
        let data = self
            .request(
                command_sets::REFERENCE_TYPE,
                reference_type_commands::SIGNATURE,
                |packet| {
                    packet.put_id(ref_type_id);
                },
            )
            .await?;
        read_string(&mut data.as_slice())
    }

    /// ReferenceType.Methods
    pub async fn get_methods(&self, ref_type_id: ReferenceTypeId) -> JdwpResult<Vec<MethodInfo>> {
        let data = self
            .request(
                command_sets::REFERENCE_TYPE,
                reference_type_commands::METHODS,
                |packet| {
                    packet.put_id(ref_type_id);
                },
            )
            .await?;

        let mut data = data.as_slice();
        let count = read_count(&mut data)?;
        let mut methods = Vec::with_capacity(count);

        for _ in 0..count {
            methods.push(MethodInfo {
                method_id: read_u64(&mut data)?,
                name: read_string(&mut data)?,
                signature: read_string(&mut data)?,
                mod_bits: read_i32(&mut data)?,
            });
        }

        Ok(methods)
    }

    /// ReferenceType.Instances (JDWP 1.6+)
    ///
    /// `max_instances` of 0 means no limit.
    pub async fn get_instances(
        &self,
        ref_type_id: ReferenceTypeId,
        max_instances: i32,
    ) -> JdwpResult<Vec<ObjectId>> {
        let data = self
            .request(
                command_sets::REFERENCE_TYPE,
                reference_type_commands::INSTANCES,
                |packet| {
                    packet.put_id(ref_type_id).put_i32(max_instances);
                },
            )
            .await?;

        let mut data = data.as_slice();
        let count = read_count(&mut data)?;
        let mut instances = Vec::with_capacity(count);
        for _ in 0..count {
            instances.push(read_tagged_object_id(&mut data)?);
        }

        Ok(instances)
    }
}
