//! GLSL converter
//!
//! Holds the persistent settings of a converter instance and drives a
//! [`Backend`] through validation and compilation.
//!
//! Settings calls move the converter `Idle/Ready -> Configuring -> Ready`,
//! validate and convert calls move it `Ready -> Validating|Compiling -> Done`
//! and back to `Ready`. A failed settings call leaves the previous settings
//! in place.

use std::fs;
use std::path::Path;

use crate::backend::{Backend, ConversionRequest, Diagnostics, Mode};
use crate::config::{Configuration, ResourceLimits};
use crate::debug_info::DebugInfoLevel;
use crate::definitions::DefinitionSet;
use crate::error::{ConfigError, ConvertError};
use crate::format::{ConverterFeatures, Format};
use crate::runtime::BackendRuntime;
use crate::shader::CompiledModule;
use crate::stage::Stage;
use crate::target::{negotiate_target, TargetEnvironment};
use crate::version::{
    apply_version_override, negotiate_version, scan_version_directive, GlslVersion,
    VersionSource, MIN_COMPILE_VERSION,
};

/// Where a converter is in its call sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterState {
    Idle,
    Configuring,
    Ready,
    Validating,
    Compiling,
    Done,
}

/// Outcome of a validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub accepted: bool,
    /// Backend diagnostics, empty if there were none
    pub diagnostics: String,
}

impl ValidationReport {
    /// The "could not validate" outcome, used when the input can't be read.
    fn unavailable() -> Self {
        Self {
            accepted: false,
            diagnostics: String::new(),
        }
    }
}

impl From<ValidationReport> for (bool, String) {
    fn from(report: ValidationReport) -> Self {
        (report.accepted, report.diagnostics)
    }
}

/// Persistent settings, replaced as a whole by every settings call.
#[derive(Debug, Clone, Default)]
struct Settings {
    input_version: Option<GlslVersion>,
    output_format: Format,
    target: TargetEnvironment,
    definitions: DefinitionSet,
    debug_info: DebugInfoLevel,
    limits: ResourceLimits,
    warnings_as_errors: bool,
}

/// GLSL validator and GLSL to SPIR-V converter.
///
/// One instance isn't meant to be shared between threads; use one converter
/// per thread instead. A [`BackendRuntime`] has to be alive for any
/// validation or conversion to happen.
///
/// # Example
///
/// ```no_run
/// use glsl_converter::{BackendRuntime, Format, GlslConverter, NagaBackend, Stage};
///
/// let _runtime = BackendRuntime::initialize();
/// let mut converter = GlslConverter::new(NagaBackend::new());
/// converter.set_output_format(Format::Spirv, "vulkan1.1").unwrap();
///
/// let spirv = converter
///     .convert_file_to_data(Stage::Unspecified, "shader.frag")
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct GlslConverter<B> {
    backend: B,
    settings: Settings,
    state: ConverterState,
}

impl<B: Backend> GlslConverter<B> {
    /// Converter with default settings: GLSL version from the source, Vulkan
    /// 1.0 with SPIR-V 1.0, no definitions and no debug info.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            settings: Settings::default(),
            state: ConverterState::Idle,
        }
    }

    /// Converter with defaults taken from a configuration store.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any of the configured values is invalid.
    pub fn with_configuration(backend: B, config: &Configuration) -> Result<Self, ConfigError> {
        let mut converter = Self::new(backend);

        let input_version = config.text("input_version")?;
        let output_version = config.text("output_version")?;
        let debug_info_level = config.text("debug_info_level")?;
        let limits = config.limits()?;
        let warnings_as_errors = config.flag("warnings_as_errors")?;

        converter.configure(|settings| {
            settings.input_version = parse_input_version(input_version)?;
            settings.target = negotiate_target(Some(output_version))?;
            settings.debug_info = DebugInfoLevel::resolve(debug_info_level);
            settings.limits = limits;
            settings.warnings_as_errors = warnings_as_errors;
            Ok(())
        })?;

        Ok(converter)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> ConverterState {
        self.state
    }

    /// Every operation is supported.
    pub fn features(&self) -> ConverterFeatures {
        ConverterFeatures::all()
    }

    /// Explicit input version override, if any.
    pub fn input_version(&self) -> Option<GlslVersion> {
        self.settings.input_version
    }

    pub fn output_format(&self) -> Format {
        self.settings.output_format
    }

    pub fn target(&self) -> TargetEnvironment {
        self.settings.target
    }

    /// User definitions, without the target's implicit one.
    pub fn definitions(&self) -> &DefinitionSet {
        &self.settings.definitions
    }

    pub fn debug_info_level(&self) -> DebugInfoLevel {
        self.settings.debug_info
    }

    /// Set the input format and optionally force a GLSL version.
    ///
    /// `format` has to be `Glsl` or `Unspecified`. An empty `version` takes
    /// the version from the source's `#version` directive, otherwise it has
    /// to be one of the accepted `#version` strings such as `330 core` or
    /// `310 es`.
    pub fn set_input_format(&mut self, format: Format, version: &str) -> Result<(), ConfigError> {
        self.configure(|settings| {
            if !matches!(format, Format::Unspecified | Format::Glsl) {
                return Err(ConfigError::UnsupportedInputFormat(format));
            }
            settings.input_version = parse_input_version(version)?;
            Ok(())
        })
    }

    /// Set the output format and target.
    ///
    /// `format` has to be `Spirv` or `Unspecified`, `version` is a target
    /// string such as `vulkan1.1` or `opengl4.5 spv1.2`. Empty means Vulkan
    /// 1.0 with SPIR-V 1.0.
    pub fn set_output_format(&mut self, format: Format, version: &str) -> Result<(), ConfigError> {
        self.configure(|settings| {
            if !matches!(format, Format::Unspecified | Format::Spirv) {
                return Err(ConfigError::UnsupportedOutputFormat(format));
            }
            settings.target = negotiate_target(Some(version))?;
            settings.output_format = format;
            Ok(())
        })
    }

    /// Replace the preprocessor definitions.
    pub fn set_definitions<N, V>(
        &mut self,
        definitions: impl IntoIterator<Item = (N, V)>,
    ) -> Result<(), ConfigError>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let definitions = DefinitionSet::from_pairs(definitions);
        self.configure(|settings| {
            settings.definitions = definitions?;
            Ok(())
        })
    }

    /// Set the debug info level. `""` and `"0"` disable debug info, anything
    /// else embeds the source and line info.
    pub fn set_debug_info_level(&mut self, level: &str) {
        let level = DebugInfoLevel::resolve(level);
        // Resolving a level never fails
        let _ = self.configure(|settings| {
            settings.debug_info = level;
            Ok(())
        });
    }

    fn configure(
        &mut self,
        update: impl FnOnce(&mut Settings) -> Result<(), ConfigError>,
    ) -> Result<(), ConfigError> {
        let previous = self.state;
        self.transition(ConverterState::Configuring);

        let mut settings = self.settings.clone();
        match update(&mut settings) {
            Ok(()) => {
                self.settings = settings;
                self.transition(ConverterState::Ready);
                Ok(())
            }
            Err(err) => {
                self.transition(previous);
                Err(err)
            }
        }
    }

    fn transition(&mut self, next: ConverterState) {
        log::trace!("Converter state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Build the request the backend would receive for this input.
    ///
    /// `stage` is resolved against `filename` the same way file entry points
    /// do it.
    pub fn resolve_request(
        &self,
        stage: Stage,
        data: &[u8],
        filename: Option<&Path>,
        mode: Mode,
    ) -> ConversionRequest {
        let stage = Stage::resolve(stage, filename);

        if let Err(err) = std::str::from_utf8(data) {
            log::warn!("Source is not valid UTF-8, invalid bytes replaced: {}", err);
        }
        let source = String::from_utf8_lossy(data).into_owned();
        let directive = scan_version_directive(&source);
        let version = negotiate_version(
            directive.as_ref().and_then(|d| d.version),
            self.settings.input_version,
        );
        let source = if version.source == VersionSource::Override {
            apply_version_override(&source, directive.as_ref(), version.version)
        } else {
            source
        };

        let target = self.settings.target;
        let request = ConversionRequest {
            stage,
            version,
            target,
            definitions: self.settings.definitions.with_target(&target),
            debug_info: self.settings.debug_info,
            limits: self.settings.limits,
            mode,
            source,
            filename: filename.map(Path::to_path_buf),
        };

        log::debug!(
            "Resolved {} shader: GLSL {} ({:?}), target {}, debug info {}, {} definition(s)",
            request.stage,
            request.version.version,
            request.version.source,
            request.target,
            request.debug_info,
            request.definitions.len()
        );
        request
    }

    /// Validate a GLSL source.
    ///
    /// Diagnostics from the backend end up in the report. Validation is
    /// always done with the configured target in mind, but never compiles.
    pub fn validate_data(&mut self, stage: Stage, data: &[u8]) -> ValidationReport {
        self.validate_source(stage, data, None)
    }

    /// Validate a GLSL file, detecting the stage from its name if
    /// `Stage::Unspecified` is passed.
    ///
    /// An unreadable file gives `accepted = false` with empty diagnostics and
    /// an error in the log.
    pub fn validate_file(&mut self, stage: Stage, path: impl AsRef<Path>) -> ValidationReport {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(data) => self.validate_source(stage, &data, Some(path)),
            Err(err) => {
                log::error!("Cannot read {}: {}", path.display(), err);
                ValidationReport::unavailable()
            }
        }
    }

    fn validate_source(&mut self, stage: Stage, data: &[u8], filename: Option<&Path>) -> ValidationReport {
        if !BackendRuntime::is_initialized() {
            log::error!("Cannot validate: {}", ConvertError::NotInitialized);
            return ValidationReport::unavailable();
        }
        if self.settings.output_format != Format::Unspecified {
            log::error!(
                "Output format should be Unspecified for validation but got {}",
                self.settings.output_format
            );
            return ValidationReport::unavailable();
        }

        let request = self.resolve_request(stage, data, filename, Mode::ValidateOnly);
        self.transition(ConverterState::Validating);

        let mut diagnostics = match std::str::from_utf8(data) {
            Ok(_) => Diagnostics::new(),
            Err(err) => Diagnostics::warning(format!(
                "warning: source is not valid UTF-8, invalid bytes were replaced: {}",
                err
            )),
        };
        diagnostics.extend(self.backend.validate(&request));
        let accepted = !diagnostics.has_errors()
            && !(self.settings.warnings_as_errors && diagnostics.has_warnings());

        log::info!(
            "Validated {} shader with {}: {}",
            request.stage,
            self.backend.name(),
            if accepted { "accepted" } else { "rejected" }
        );

        self.finish();
        ValidationReport {
            accepted,
            diagnostics: diagnostics.to_string(),
        }
    }

    /// Compile a GLSL source to SPIR-V.
    ///
    /// # Errors
    ///
    /// * [`ConvertError::Resolution`] if the GLSL version is older than 1.40.
    ///   A `#version` directive that isn't understood is left for the backend
    ///   to diagnose instead.
    /// * [`ConvertError::Backend`] with the backend diagnostics if it
    ///   rejects the source
    /// * [`ConvertError::MalformedOutput`] if the backend output isn't a
    ///   SPIR-V module of the negotiated version
    /// * [`ConvertError::NotInitialized`] without a live [`BackendRuntime`]
    pub fn compile_data(&mut self, stage: Stage, data: &[u8]) -> Result<CompiledModule, ConvertError> {
        self.compile_source(stage, data, None)
    }

    /// Compile a GLSL file to SPIR-V, detecting the stage from its name if
    /// `Stage::Unspecified` is passed. The filename ends up in the debug info.
    pub fn compile_file(&mut self, stage: Stage, path: impl AsRef<Path>) -> Result<CompiledModule, ConvertError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| ConvertError::io(path, e))?;
        self.compile_source(stage, &data, Some(path))
    }

    /// Compile to SPIR-V bytes.
    pub fn convert_data_to_data(&mut self, stage: Stage, data: &[u8]) -> Result<Vec<u8>, ConvertError> {
        self.compile_data(stage, data).map(CompiledModule::into_bytes)
    }

    /// Compile a file to SPIR-V bytes.
    pub fn convert_file_to_data(&mut self, stage: Stage, from: impl AsRef<Path>) -> Result<Vec<u8>, ConvertError> {
        self.compile_file(stage, from).map(CompiledModule::into_bytes)
    }

    /// Compile a file and write the SPIR-V to `to`. Nothing is written if
    /// compilation fails.
    pub fn convert_file_to_file(
        &mut self,
        stage: Stage,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
    ) -> Result<(), ConvertError> {
        let module = self.compile_file(stage, from)?;
        write_module(&module, to.as_ref())
    }

    /// Compile a source and write the SPIR-V to `to`.
    pub fn convert_data_to_file(
        &mut self,
        stage: Stage,
        data: &[u8],
        to: impl AsRef<Path>,
    ) -> Result<(), ConvertError> {
        let module = self.compile_data(stage, data)?;
        write_module(&module, to.as_ref())
    }

    fn compile_source(
        &mut self,
        stage: Stage,
        data: &[u8],
        filename: Option<&Path>,
    ) -> Result<CompiledModule, ConvertError> {
        if !BackendRuntime::is_initialized() {
            return Err(ConvertError::NotInitialized);
        }

        let request = self.resolve_request(stage, data, filename, Mode::Compile);
        self.transition(ConverterState::Compiling);

        let result = self.run_compile(&request);
        self.finish();
        result
    }

    fn run_compile(&self, request: &ConversionRequest) -> Result<CompiledModule, ConvertError> {
        let version = request.version.version;
        if !version.is_compilable() {
            match unrecognized_directive(request) {
                Some(line) => log::warn!(
                    "Unrecognized {:?}, leaving it for {} to diagnose",
                    line,
                    self.backend.name()
                ),
                None => {
                    return Err(ConvertError::Resolution(format!(
                        "compiling GLSL {} to SPIR-V is not supported, only {} and newer can be compiled; use validation instead",
                        version, MIN_COMPILE_VERSION
                    )))
                }
            }
        }

        let bytes = self.backend.compile(request).map_err(|diagnostics| {
            log::error!(
                "Compiling {} shader with {} failed:\n{}",
                request.stage,
                self.backend.name(),
                diagnostics
            );
            ConvertError::Backend {
                diagnostics: diagnostics.to_string(),
            }
        })?;

        let module = CompiledModule::new(request.stage, bytes).map_err(ConvertError::MalformedOutput)?;
        if module.spirv_version != request.target.spirv_version {
            return Err(ConvertError::MalformedOutput(format!(
                "expected SPIR-V {} but got {}",
                request.target.spirv_version, module.spirv_version
            )));
        }

        log::info!(
            "Compiled {} shader to SPIR-V {} ({} bytes)",
            request.stage,
            module.spirv_version,
            module.as_bytes().len()
        );
        Ok(module)
    }

    /// End of a validate/convert call.
    fn finish(&mut self) {
        self.transition(ConverterState::Done);
        // An Idle converter ran on defaults, which counts as configured
        self.transition(ConverterState::Ready);
    }
}

/// The source's `#version` line when it's present but wasn't understood.
fn unrecognized_directive(request: &ConversionRequest) -> Option<&str> {
    if request.version.source != VersionSource::Default {
        return None;
    }
    scan_version_directive(&request.source).map(|directive| &request.source[directive.span])
}

fn parse_input_version(version: &str) -> Result<Option<GlslVersion>, ConfigError> {
    if version.is_empty() {
        Ok(None)
    } else {
        version.parse().map(Some)
    }
}

fn write_module(module: &CompiledModule, to: &Path) -> Result<(), ConvertError> {
    fs::write(to, module.as_bytes()).map_err(|e| ConvertError::io(to, e))?;
    log::debug!("Wrote {} bytes to {}", module.as_bytes().len(), to.display());
    Ok(())
}
