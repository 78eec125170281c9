//! SPIR-V module sanity checks
//!
//! Checks the header of backend output before it's handed to the caller and
//! reads back the debug source records. This is NOT a full SPIR-V validator.

use crate::target::Version;

/// SPIR-V magic number
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

const OP_SOURCE_CONTINUED: u16 = 2;
const OP_SOURCE: u16 = 3;
const OP_EXECUTION_MODE: u16 = 16;
const EXECUTION_MODE_LOCAL_SIZE: u32 = 17;

/// Decoded SPIR-V header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpirvHeader {
    pub version: Version,
    pub bound: u32,
}

/// Validate SPIR-V binary structure.
///
/// Performs basic sanity checks on the SPIR-V header:
/// - Magic number (0x07230203)
/// - Version compatibility (1.0 - 1.6)
/// - Non-zero bound
///
/// # Arguments
///
/// * `bytes` - Raw SPIR-V binary
///
/// # Returns
///
/// * `Ok(header)` if basic structure is valid
/// * `Err(String)` with description if invalid
pub fn validate_spirv(bytes: &[u8]) -> Result<SpirvHeader, String> {
    // Header is 5 words = 20 bytes
    if bytes.len() < 20 {
        return Err(format!(
            "SPIR-V too small: {} bytes (minimum 20)",
            bytes.len()
        ));
    }

    if bytes.len() % 4 != 0 {
        return Err(format!(
            "SPIR-V size ({}) not 4-byte aligned",
            bytes.len()
        ));
    }

    let word = |i: usize| u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]]);

    let magic = word(0);
    if magic != SPIRV_MAGIC {
        return Err(format!(
            "Invalid SPIR-V magic: 0x{:08x} (expected 0x07230203)",
            magic
        ));
    }

    let version = word(1);
    let major = ((version >> 16) & 0xFF) as u8;
    let minor = ((version >> 8) & 0xFF) as u8;
    if major != 1 || minor > 6 {
        return Err(format!(
            "Unsupported SPIR-V version: {}.{} (supported: 1.0-1.6)",
            major, minor
        ));
    }

    let bound = word(3);
    if bound == 0 {
        return Err("SPIR-V bound is 0 (invalid)".to_string());
    }

    log::trace!(
        "SPIR-V validated: version {}.{}, bound {}, size {}",
        major, minor, bound, bytes.len()
    );

    Ok(SpirvHeader {
        version: Version::new(major, minor),
        bound,
    })
}

/// Concatenated text of the `OpSource` / `OpSourceContinued` records.
///
/// Returns `None` when the module has no source embedded. Stops at the first
/// malformed instruction.
pub fn embedded_source(words: &[u32]) -> Option<String> {
    let mut source: Option<String> = None;

    for (opcode, operands) in instructions(words) {
        match opcode {
            // Language, version, file id, then the source text
            OP_SOURCE if operands.len() > 3 => {
                source = Some(decode_string(&operands[3..]));
            }
            OP_SOURCE_CONTINUED => {
                if let Some(source) = source.as_mut() {
                    source.push_str(&decode_string(operands));
                }
            }
            _ => {}
        }
    }

    source
}

/// Work group size declared with `OpExecutionMode ... LocalSize x y z`, if
/// any entry point declares one.
pub fn local_size(words: &[u32]) -> Option<[u32; 3]> {
    instructions(words).find_map(|(opcode, operands)| match (opcode, operands) {
        (OP_EXECUTION_MODE, &[_, EXECUTION_MODE_LOCAL_SIZE, x, y, z]) => Some([x, y, z]),
        _ => None,
    })
}

/// `(opcode, operands)` of every instruction after the header. Stops at the
/// first malformed instruction.
fn instructions(words: &[u32]) -> impl Iterator<Item = (u16, &[u32])> {
    let mut i = 5;
    std::iter::from_fn(move || {
        let first = *words.get(i)?;
        let word_count = (first >> 16) as usize;
        if word_count == 0 || i + word_count > words.len() {
            log::trace!("Malformed instruction at word {}", i);
            return None;
        }
        let operands = &words[i + 1..i + word_count];
        i += word_count;
        Some(((first & 0xFFFF) as u16, operands))
    })
}

/// Decode a nul-terminated literal string packed into words.
fn decode_string(words: &[u32]) -> String {
    let bytes: Vec<u8> = words
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .take_while(|&b| b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
