//! Compiler backend seam
//!
//! The converter never parses GLSL itself. It resolves a [`ConversionRequest`]
//! and hands it to a [`Backend`], which either reports diagnostics or
//! produces a SPIR-V module.

use std::fmt;
use std::path::PathBuf;

use crate::config::ResourceLimits;
use crate::debug_info::DebugInfoLevel;
use crate::definitions::DefinitionSet;
use crate::stage::Stage;
use crate::target::TargetEnvironment;
use crate::version::ResolvedVersion;

pub mod naga;
pub mod recording;
#[cfg(feature = "shaderc")]
pub mod shaderc;

pub use self::naga::NagaBackend;
pub use self::recording::RecordingBackend;
#[cfg(feature = "shaderc")]
pub use self::shaderc::ShadercBackend;

/// What the backend is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Parse and semantic checks only
    ValidateOnly,
    /// Full compilation to SPIR-V
    Compile,
}

/// Fully resolved input for a single backend invocation.
///
/// Built fresh for every call and never modified after it's handed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Always a concrete stage, never `Stage::Unspecified`
    pub stage: Stage,
    pub version: ResolvedVersion,
    pub target: TargetEnvironment,
    /// User definitions followed by the target's implicit one
    pub definitions: DefinitionSet,
    pub debug_info: DebugInfoLevel,
    pub limits: ResourceLimits,
    pub mode: Mode,
    /// Source text, with the `#version` directive already rewritten if an
    /// override is in effect
    pub source: String,
    /// Set when converting from a file, embedded together with the source
    pub filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Diagnostics reported by a backend, in the order they were emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut diagnostics = Self::new();
        diagnostics.push(Severity::Error, message);
        diagnostics
    }

    pub fn warning(message: impl Into<String>) -> Self {
        let mut diagnostics = Self::new();
        diagnostics.push(Severity::Warning, message);
        diagnostics
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.0.push(Diagnostic {
            severity,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    /// Messages separated by newlines, without a trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(diagnostic.message.trim_end())?;
        }
        Ok(())
    }
}

/// A GLSL compiler/validator.
///
/// Implementations get a fully resolved request and report problems with the
/// shader as [`Diagnostics`], never as panics.
pub trait Backend {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Parse and check the source against the request's target. An empty
    /// result (or one with warnings only) means the source was accepted.
    fn validate(&self, request: &ConversionRequest) -> Diagnostics;

    /// Compile to a SPIR-V module in little-endian byte order.
    fn compile(&self, request: &ConversionRequest) -> Result<Vec<u8>, Diagnostics>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn validate(&self, request: &ConversionRequest) -> Diagnostics {
        (**self).validate(request)
    }

    fn compile(&self, request: &ConversionRequest) -> Result<Vec<u8>, Diagnostics> {
        (**self).compile(request)
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn validate(&self, request: &ConversionRequest) -> Diagnostics {
        (**self).validate(request)
    }

    fn compile(&self, request: &ConversionRequest) -> Result<Vec<u8>, Diagnostics> {
        (**self).compile(request)
    }
}
