// Helpers for reading JDWP data types from reply and event buffers

use bytes::Buf;
use crate::protocol::{JdwpError, JdwpResult};
use crate::types::Location;

fn ensure(buf: &[u8], needed: usize, what: &str) -> JdwpResult<()> {
    if buf.remaining() < needed {
        return Err(JdwpError::Protocol(format!(
            "Not enough data for {}: expected {}, got {}",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

/// Read a JDWP string (4-byte length prefix + UTF-8 bytes)
pub fn read_string(buf: &mut &[u8]) -> JdwpResult<String> {
    ensure(buf, 4, "string length")?;
    let len = buf.get_u32() as usize;
    ensure(buf, len, "string")?;

    let bytes = &buf[..len];
    buf.advance(len);

    String::from_utf8(bytes.to_vec())
        .map_err(|e| JdwpError::Protocol(format!("Invalid UTF-8 in string: {}", e)))
}

pub fn read_u8(buf: &mut &[u8]) -> JdwpResult<u8> {
    ensure(buf, 1, "u8")?;
    Ok(buf.get_u8())
}

pub fn read_i32(buf: &mut &[u8]) -> JdwpResult<i32> {
    ensure(buf, 4, "i32")?;
    Ok(buf.get_i32())
}

pub fn read_u64(buf: &mut &[u8]) -> JdwpResult<u64> {
    ensure(buf, 8, "u64")?;
    Ok(buf.get_u64())
}

pub fn read_i64(buf: &mut &[u8]) -> JdwpResult<i64> {
    ensure(buf, 8, "i64")?;
    Ok(buf.get_i64())
}

/// Read a repeat count, rejecting negative values
pub fn read_count(buf: &mut &[u8]) -> JdwpResult<usize> {
    let count = read_i32(buf)?;
    usize::try_from(count)
        .map_err(|_| JdwpError::Protocol(format!("Negative element count: {}", count)))
}

/// Read a tagged object ID (1-byte tag + object ID)
pub fn read_tagged_object_id(buf: &mut &[u8]) -> JdwpResult<u64> {
    let _tag = read_u8(buf)?;
    read_u64(buf)
}

pub fn read_location(buf: &mut &[u8]) -> JdwpResult<Location> {
    let type_tag = read_u8(buf)?;
    let class_id = read_u64(buf)?;
    let method_id = read_u64(buf)?;
    let index = read_u64(buf)?;

    Ok(Location {
        type_tag,
        class_id,
        method_id,
        index,
    })
}
