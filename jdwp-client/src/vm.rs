// VirtualMachine command implementations
//
// Class enumeration, heap-wide instance counts and global suspend/resume

use crate::commands::{command_sets, vm_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::{read_count, read_i32, read_i64, read_string, read_u64, read_u8};
use crate::types::{ClassInfo, ReferenceTypeId};
use serde::{Deserialize, Serialize};

/// JVM version information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmVersion {
    pub description: String,
    pub jdwp_major: i32,
    pub jdwp_minor: i32,
    pub vm_version: String,
    pub vm_name: String,
}

impl VmVersion {
    /// Android runtimes (Dalvik/ART) report "Dalvik" as the VM name
    pub fn is_android(&self) -> bool {
        self.vm_name.contains("Dalvik")
    }
}

fn read_classes(mut data: &[u8], signature: Option<&str>) -> JdwpResult<Vec<ClassInfo>> {
    let count = read_count(&mut data)?;
    let mut classes = Vec::with_capacity(count);

    for _ in 0..count {
        let ref_type_tag = read_u8(&mut data)?;
        let type_id = read_u64(&mut data)?;
        let signature = match signature {
            Some(sig) => sig.to_string(),
            None => read_string(&mut data)?,
        };
        let status = read_i32(&mut data)?;

        classes.push(ClassInfo {
            ref_type_tag,
            type_id,
            signature,
            status,
        });
    }

    Ok(classes)
}

impl JdwpConnection {
    /// VirtualMachine.Version
    pub async fn get_version(&self) -> JdwpResult<VmVersion> {
        let data = self
            .request(command_sets::VIRTUAL_MACHINE, vm_commands::VERSION, |_| {})
            .await?;
        let mut data = data.as_slice();

        Ok(VmVersion {
            description: read_string(&mut data)?,
            jdwp_major: read_i32(&mut data)?,
            jdwp_minor: read_i32(&mut data)?,
            vm_version: read_string(&mut data)?,
            vm_name: read_string(&mut data)?,
        })
    }

    /// VirtualMachine.AllClasses, in the order the VM reports them
    pub async fn all_classes(&self) -> JdwpResult<Vec<ClassInfo>> {
        let data = self
            .request(command_sets::VIRTUAL_MACHINE, vm_commands::ALL_CLASSES, |_| {})
            .await?;
        read_classes(&data, None)
    }

    /// VirtualMachine.ClassesBySignature
    /// Signature format: "Lcom/example/MyClass;" for classes
    pub async fn classes_by_signature(&self, signature: &str) -> JdwpResult<Vec<ClassInfo>> {
        let data = self
            .request(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::CLASSES_BY_SIGNATURE,
                |packet| {
                    packet.put_string(signature);
                },
            )
            .await?;
        read_classes(&data, Some(signature))
    }

    /// VirtualMachine.InstanceCounts (JDWP 1.6+)
    ///
    /// Returns one count per requested type, in request order.
    pub async fn instance_counts(&self, ref_types: &[ReferenceTypeId]) -> JdwpResult<Vec<u64>> {
        let data = self
            .request(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::INSTANCE_COUNTS,
                |packet| {
                    packet.put_i32(ref_types.len() as i32);
                    for ref_type in ref_types {
                        packet.put_id(*ref_type);
                    }
                },
            )
            .await?;

        let mut data = data.as_slice();
        let count = read_count(&mut data)?;
        let mut counts = Vec::with_capacity(count);
        for _ in 0..count {
            counts.push(read_i64(&mut data)?.max(0) as u64);
        }

        if counts.len() != ref_types.len() {
            return Err(crate::protocol::JdwpError::Protocol(format!(
                "InstanceCounts returned {} counts for {} types",
                counts.len(),
                ref_types.len()
            )));
        }

        Ok(counts)
    }

    /// VirtualMachine.Suspend
    pub async fn suspend_all(&self) -> JdwpResult<()> {
        self.request(command_sets::VIRTUAL_MACHINE, vm_commands::SUSPEND, |_| {})
            .await?;
        Ok(())
    }

    /// VirtualMachine.Resume
    pub async fn resume_all(&self) -> JdwpResult<()> {
        self.request(command_sets::VIRTUAL_MACHINE, vm_commands::RESUME, |_| {})
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_read_all_classes_reply() {
        let mut data = Vec::new();
        data.put_i32(2);
        for (id, sig) in [(0x1u64, "Ljava/lang/String;"), (0x2, "[I")] {
            data.put_u8(1);
            data.put_u64(id);
            data.put_u32(sig.len() as u32);
            data.extend_from_slice(sig.as_bytes());
            data.put_i32(7);
        }

        let classes = read_classes(&data, None).unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].name(), "java.lang.String");
        assert_eq!(classes[1].type_id, 2);
        assert_eq!(classes[1].name(), "int[]");
    }

    #[test]
    fn test_android_detection() {
        let version = VmVersion {
            description: String::new(),
            jdwp_major: 1,
            jdwp_minor: 6,
            vm_version: "2.1.0".to_string(),
            vm_name: "Dalvik".to_string(),
        };
        assert!(version.is_android());
    }
}
