// JDWP type definitions
//
// IDs are assumed to be 8 bytes wide, which is what HotSpot and ART report
// through VirtualMachine.IDSizes.

use serde::{Deserialize, Serialize};

pub type ObjectId = u64;
pub type ThreadId = ObjectId;
pub type ReferenceTypeId = u64;
pub type MethodId = u64;
pub type FrameId = u64;

// Location identifies a code position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub type_tag: u8, // 1=class, 2=interface, 3=array
    pub class_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64,
}

/// A loaded reference type as reported by AllClasses / ClassesBySignature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub ref_type_tag: u8, // 1=class, 2=interface, 3=array
    pub type_id: ReferenceTypeId,
    pub signature: String,
    pub status: i32,
}

impl ClassInfo {
    /// Java-style name, e.g. `java.lang.String` or `int[]`
    pub fn name(&self) -> String {
        signature_to_name(&self.signature)
    }
}

/// Convert a class name to its JVM signature
///
/// `com.example.Foo` -> `Lcom/example/Foo;`, `int[]` -> `[I`
pub fn name_to_signature(name: &str) -> String {
    if let Some(element) = name.strip_suffix("[]") {
        return format!("[{}", name_to_signature(element));
    }
    match name {
        "boolean" => "Z".to_string(),
        "byte" => "B".to_string(),
        "char" => "C".to_string(),
        "short" => "S".to_string(),
        "int" => "I".to_string(),
        "long" => "J".to_string(),
        "float" => "F".to_string(),
        "double" => "D".to_string(),
        _ => format!("L{};", name.replace('.', "/")),
    }
}

/// Convert a JVM signature back to a Java-style name
pub fn signature_to_name(signature: &str) -> String {
    if let Some(element) = signature.strip_prefix('[') {
        return format!("{}[]", signature_to_name(element));
    }
    match signature {
        "Z" => "boolean".to_string(),
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "S" => "short".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "F" => "float".to_string(),
        "D" => "double".to_string(),
        _ => signature
            .strip_prefix('L')
            .and_then(|s| s.strip_suffix(';'))
            .unwrap_or(signature)
            .replace('/', "."),
    }
}
