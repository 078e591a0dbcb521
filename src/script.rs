//! Script predicates, instruction decoding and diagnostic formatting

use crate::error::{Result, ScriptError};
use crate::opcodes::*;
use crate::types::ByteString;

/// Script's canonical numeric truthiness: any nonzero byte counts as true,
/// except an all-zero value or a lone negative-zero encoding (0x80 in the
/// most significant position) counts as false.
pub fn cast_to_bool(data: &[u8]) -> bool {
    for (i, &byte) in data.iter().enumerate() {
        if byte != 0 {
            if i == data.len() - 1 && byte == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}

/// The P2SH template: exactly `OP_HASH160 <20-byte hash> OP_EQUAL`.
pub fn is_pay_to_script_hash(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == 20 && script[22] == OP_EQUAL
}

/// True when every unit of the script is a data push (opcode <= OP_16).
/// Undecodable scripts are not push-only.
pub fn is_push_only(script: &[u8]) -> bool {
    let mut pc = 0;
    while pc < script.len() {
        if script[pc] > OP_16 {
            return false;
        }
        match parse_instruction(script, pc) {
            Ok((_, _, next_pc)) => pc = next_pc,
            Err(_) => return false,
        }
    }
    true
}

/// Decode the single opcode or push-data unit starting at `pc`.
///
/// Returns the opcode byte, the pushed data for push units, and the offset of
/// the next unit. Truncated push data fails with `BadOpcode`.
pub(crate) fn parse_instruction(
    script: &[u8],
    pc: usize,
) -> Result<(u8, Option<ByteString>, usize)> {
    let opcode = *script.get(pc).ok_or(ScriptError::BadOpcode)?;
    let mut cursor = pc + 1;

    let len = match opcode {
        0x01..=0x4b => opcode as usize,
        OP_PUSHDATA1 => {
            let n = *script.get(cursor).ok_or(ScriptError::BadOpcode)?;
            cursor += 1;
            n as usize
        }
        OP_PUSHDATA2 => {
            let bytes = script
                .get(cursor..cursor + 2)
                .ok_or(ScriptError::BadOpcode)?;
            cursor += 2;
            u16::from_le_bytes([bytes[0], bytes[1]]) as usize
        }
        OP_PUSHDATA4 => {
            let bytes = script
                .get(cursor..cursor + 4)
                .ok_or(ScriptError::BadOpcode)?;
            cursor += 4;
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
        }
        _ => return Ok((opcode, None, cursor)),
    };

    let data = script
        .get(cursor..cursor + len)
        .ok_or(ScriptError::BadOpcode)?;
    Ok((opcode, Some(data.to_vec()), cursor + len))
}

/// Check that `data` could not have been pushed with a shorter encoding
/// than the push unit `opcode` that carried it.
pub(crate) fn is_minimal_push(opcode: u8, data: &[u8]) -> bool {
    match data.len() {
        0 => false,                                    // should have used OP_0
        1 if data[0] >= 1 && data[0] <= 16 => false,   // OP_1..OP_16
        1 if data[0] == 0x81 => false,                 // OP_1NEGATE
        n if n <= 75 => opcode as usize == n,          // direct push
        n if n <= 255 => opcode == OP_PUSHDATA1,
        n if n <= 65535 => opcode == OP_PUSHDATA2,
        _ => true,
    }
}

/// Decode a little-endian sign-magnitude script number, at most 4 bytes.
pub(crate) fn decode_num(data: &[u8], require_minimal: bool) -> Result<i64> {
    if data.len() > 4 {
        return Err(ScriptError::ScriptNumOverflow);
    }
    if require_minimal && !data.is_empty() {
        // The most significant byte must carry payload beyond the sign bit,
        // unless the sign bit would not fit in the preceding byte.
        if data[data.len() - 1] & 0x7f == 0
            && (data.len() == 1 || data[data.len() - 2] & 0x80 == 0)
        {
            return Err(ScriptError::MinimalData);
        }
    }
    let mut result: i64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        result |= (byte as i64) << (8 * i);
    }
    if let Some(&last) = data.last() {
        if last & 0x80 != 0 {
            result &= !(0x80i64 << (8 * (data.len() - 1)));
            result = -result;
        }
    }
    Ok(result)
}

/// Encode a number in little-endian sign-magnitude, shortest form.
pub(crate) fn encode_num(value: i64) -> ByteString {
    if value == 0 {
        return Vec::new();
    }
    let mut result = Vec::new();
    let negative = value < 0;
    let mut abs_value = value.unsigned_abs();
    while abs_value > 0 {
        result.push((abs_value & 0xff) as u8);
        abs_value >>= 8;
    }
    // If the high bit of the top byte is occupied, the sign needs its own byte.
    if result[result.len() - 1] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = result.len() - 1;
        result[last] |= 0x80;
    }
    result
}

/// Lowercase hex rendering of a stack element for diagnostics.
pub fn hex_str(data: &[u8]) -> String {
    data.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Render a script as space-separated opcode names and hex push data.
/// Decoding stops at the first malformed unit, which is marked inline.
pub fn disassemble(script: &[u8]) -> String {
    let mut parts = Vec::new();
    let mut pc = 0;
    while pc < script.len() {
        match parse_instruction(script, pc) {
            Ok((_, Some(data), next_pc)) => {
                if data.is_empty() {
                    parts.push("0".to_string());
                } else {
                    parts.push(hex_str(&data));
                }
                pc = next_pc;
            }
            Ok((opcode, None, next_pc)) => {
                parts.push(opcode_name(opcode).to_string());
                pc = next_pc;
            }
            Err(_) => {
                parts.push("[malformed push]".to_string());
                break;
            }
        }
    }
    parts.join(" ")
}
