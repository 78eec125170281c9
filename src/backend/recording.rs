//! Deterministic backend that records requests
//!
//! Accepts or rejects according to how it was set up and produces a minimal
//! SPIR-V module that mirrors the request: the header carries the requested
//! SPIR-V version and, with debug info enabled, the source is embedded the
//! way a real compiler would. Used to test negotiation without a compiler.

use std::cell::RefCell;

use super::{Backend, ConversionRequest, Diagnostics};
use crate::debug_info::DebugInfoFlags;
use crate::shader::words_to_bytes;
use crate::validation::SPIRV_MAGIC;

const OP_SOURCE_CONTINUED: u32 = 2;
const OP_SOURCE: u32 = 3;
const OP_STRING: u32 = 7;
const SOURCE_LANGUAGE_GLSL: u32 = 2;

/// Word count is a 16 bit field. `OpSource` spends 4 words before its
/// string, which also needs a terminating nul.
const MAX_SOURCE_CHUNK: usize = (0xFFFF - 4) * 4 - 1;

#[derive(Debug, Default)]
pub struct RecordingBackend {
    requests: RefCell<Vec<ConversionRequest>>,
    diagnostics: Diagnostics,
    output: Option<Vec<u8>>,
}

impl RecordingBackend {
    /// A backend accepting every source.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend reporting `diagnostics` for every request. Compilation fails
    /// if any of them is an error.
    pub fn with_diagnostics(diagnostics: Diagnostics) -> Self {
        Self {
            diagnostics,
            ..Self::default()
        }
    }

    /// A backend returning `bytes` verbatim from every compilation.
    pub fn with_output(bytes: Vec<u8>) -> Self {
        Self {
            output: Some(bytes),
            ..Self::default()
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ConversionRequest> {
        self.requests.borrow().clone()
    }

    pub fn last_request(&self) -> Option<ConversionRequest> {
        self.requests.borrow().last().cloned()
    }

    fn record(&self, request: &ConversionRequest) {
        self.requests.borrow_mut().push(request.clone());
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn validate(&self, request: &ConversionRequest) -> Diagnostics {
        self.record(request);
        self.diagnostics.clone()
    }

    fn compile(&self, request: &ConversionRequest) -> Result<Vec<u8>, Diagnostics> {
        self.record(request);
        if self.diagnostics.has_errors() {
            return Err(self.diagnostics.clone());
        }
        match &self.output {
            Some(bytes) => Ok(bytes.clone()),
            None => Ok(words_to_bytes(&module_for(request))),
        }
    }
}

/// Minimal module for a request.
fn module_for(request: &ConversionRequest) -> Vec<u32> {
    let version = request.target.spirv_version;
    let mut words = vec![
        SPIRV_MAGIC,
        (u32::from(version.major) << 16) | (u32::from(version.minor) << 8),
        0,
        1,
        0,
    ];

    if request.debug_info.flags().contains(DebugInfoFlags::EMBED_SOURCE) {
        let file_name = request
            .filename
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();

        let name = pack_string(source_chunks(&file_name, MAX_SOURCE_CHUNK).next().unwrap_or_default());
        words.push(((2 + name.len() as u32) << 16) | OP_STRING);
        words.push(1);
        words.extend(&name);

        let mut chunks = source_chunks(&request.source, MAX_SOURCE_CHUNK);
        let first = pack_string(chunks.next().unwrap_or_default());
        words.push(((4 + first.len() as u32) << 16) | OP_SOURCE);
        words.extend([SOURCE_LANGUAGE_GLSL, u32::from(request.version.version.number), 1]);
        words.extend(&first);

        for chunk in chunks {
            let chunk = pack_string(chunk);
            words.push(((1 + chunk.len() as u32) << 16) | OP_SOURCE_CONTINUED);
            words.extend(&chunk);
        }

        // One id (the file name string) in use
        words[3] = 2;
    }

    words
}

/// Split `s` into pieces of at most `max` bytes, on char boundaries.
fn source_chunks(s: &str, max: usize) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut end = rest.len().min(max);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

/// Pack a nul-terminated literal string into words.
fn pack_string(s: &str) -> Vec<u32> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    bytes.resize(bytes.len().div_ceil(4) * 4, 0);
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
