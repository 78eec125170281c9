//! GLSL shader validation and GLSL to SPIR-V conversion
//!
//! A [`GlslConverter`] keeps persistent settings (input GLSL version, output
//! target, preprocessor definitions, debug info level), resolves them against
//! each input into a [`ConversionRequest`] and hands that to a [`Backend`].
//!
//! Resolution rules:
//! - the stage is explicit or detected from the filename, `Vertex` otherwise
//! - the GLSL version is the override, else the `#version` directive, else 110
//! - the target defaults to Vulkan 1.0 with SPIR-V 1.0
//! - `GL_SPIRV` or `VULKAN` is defined according to the target API
//!
//! `ShadercBackend` (glslang, behind the default `shaderc` feature) does the
//! actual compilation. [`NagaBackend`] is a pure Rust alternative covering
//! GLSL 440 and up for vertex, fragment and compute shaders.
//! [`RecordingBackend`] only records what it was asked to do.

pub mod backend;
pub mod config;
pub mod converter;
pub mod debug_info;
pub mod definitions;
pub mod error;
pub mod format;
pub mod runtime;
pub mod shader;
pub mod stage;
pub mod target;
pub mod validation;
pub mod version;

pub use backend::{Backend, ConversionRequest, Diagnostic, Diagnostics, Mode, NagaBackend, RecordingBackend, Severity};
#[cfg(feature = "shaderc")]
pub use backend::ShadercBackend;
pub use config::{ConfigValue, Configuration, ResourceLimits};
pub use converter::{ConverterState, GlslConverter, ValidationReport};
pub use debug_info::{DebugInfoFlags, DebugInfoLevel};
pub use definitions::DefinitionSet;
pub use error::{ConfigError, ConvertError};
pub use format::{ConverterFeatures, Format};
pub use runtime::BackendRuntime;
pub use shader::CompiledModule;
pub use stage::Stage;
pub use target::{negotiate_target, TargetApi, TargetEnvironment, Version};
pub use version::{negotiate_version, GlslVersion, Profile, ResolvedVersion, VersionSource};
