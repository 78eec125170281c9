//! Compiled SPIR-V module
//!
//! Wraps the bytes a backend produced with the metadata of the conversion.

use sha2::{Digest, Sha256};

use crate::stage::Stage;
use crate::target::Version;
use crate::validation::{self, SpirvHeader};

/// Result of a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    /// Stage the module was compiled for
    pub stage: Stage,

    /// SPIR-V version from the module header
    pub spirv_version: Version,

    /// Raw SPIR-V, little-endian
    bytes: Vec<u8>,
}

impl CompiledModule {
    /// Wrap backend output, checking its header first.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the bytes aren't a
    /// well-formed SPIR-V module.
    pub fn new(stage: Stage, bytes: Vec<u8>) -> Result<Self, String> {
        let SpirvHeader { version, bound } = validation::validate_spirv(&bytes)?;

        log::debug!(
            "Compiled {} module: spirv_version={}, size={}, id bound={}",
            stage,
            version,
            bytes.len(),
            bound
        );

        Ok(Self {
            stage,
            spirv_version: version,
            bytes,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Module as 32-bit words.
    pub fn words(&self) -> Vec<u32> {
        bytes_to_words(&self.bytes)
    }

    /// Content-addressed module id: SHA-256 of the bytes, hex encoded.
    ///
    /// Identical modules always get the same id.
    pub fn id(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Source text embedded in the module's debug info, if any.
    pub fn embedded_source(&self) -> Option<String> {
        validation::embedded_source(&self.words())
    }
}

/// Serialize words in little-endian order.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Read little-endian words. Trailing bytes that don't form a whole word
/// are dropped.
pub fn bytes_to_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
