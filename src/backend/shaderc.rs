//! Production backend built on glslang through shaderc
//!
//! Covers everything the converter negotiates: every stage, desktop and ES
//! GLSL from 1.10 on, OpenGL and Vulkan targets, SPIR-V 1.0 to 1.5, resource
//! limits and debug info. shaderc has no parse-only entry point, so
//! validation compiles the source and throws the module away.

use ::shaderc::{
    CompilationArtifact, CompileOptions, Compiler, EnvVersion, GlslProfile, Limit, ShaderKind,
    SpirvVersion, TargetEnv,
};

use super::{Backend, ConversionRequest, Diagnostics, Severity};
use crate::config::ResourceLimits;
use crate::debug_info::DebugInfoFlags;
use crate::stage::Stage;
use crate::target::{TargetApi, TargetEnvironment, Version};
use crate::validation;
use crate::version::{Profile, VersionSource};

const ENTRY_POINT: &str = "main";

/// Backend wrapping a shaderc compiler instance.
pub struct ShadercBackend {
    compiler: Compiler,
}

impl std::fmt::Debug for ShadercBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadercBackend").finish_non_exhaustive()
    }
}

impl ShadercBackend {
    /// `None` if shaderc fails to create a compiler.
    pub fn new() -> Option<Self> {
        let compiler = Compiler::new()?;
        Some(Self { compiler })
    }

    fn run(&self, request: &ConversionRequest) -> Result<CompilationArtifact, Diagnostics> {
        // shaderc panics on interior NULs
        if request.source.contains('\0') {
            return Err(Diagnostics::error("error: source contains a NUL character"));
        }
        if request
            .definitions
            .iter()
            .any(|(name, value)| name.contains('\0') || value.contains('\0'))
        {
            return Err(Diagnostics::error("error: definition contains a NUL character"));
        }

        let options = compile_options(request)?;
        let file_name = request
            .filename
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();

        let artifact = self
            .compiler
            .compile_into_spirv(
                &request.source,
                shader_kind(request.stage),
                &file_name,
                ENTRY_POINT,
                Some(&options),
            )
            .map_err(|err| match err {
                ::shaderc::Error::CompilationError(_, log) => parse_log(&log, Severity::Error),
                other => Diagnostics::error(format!("error: {}", other)),
            })?;

        if request.stage == Stage::Compute {
            check_invocations(&artifact, &request.limits)?;
        }
        Ok(artifact)
    }
}

impl Backend for ShadercBackend {
    fn name(&self) -> &str {
        "shaderc"
    }

    fn validate(&self, request: &ConversionRequest) -> Diagnostics {
        match self.run(request) {
            Ok(artifact) => warnings(&artifact),
            Err(diagnostics) => diagnostics,
        }
    }

    fn compile(&self, request: &ConversionRequest) -> Result<Vec<u8>, Diagnostics> {
        let artifact = self.run(request)?;

        let warnings = warnings(&artifact);
        if !warnings.is_empty() {
            log::warn!("{}", warnings);
        }
        log::debug!(
            "shaderc emitted {} bytes of SPIR-V {}",
            artifact.len(),
            request.target.spirv_version
        );
        Ok(artifact.as_binary_u8().to_vec())
    }
}

fn compile_options(request: &ConversionRequest) -> Result<CompileOptions<'static>, Diagnostics> {
    let mut options = CompileOptions::new()
        .ok_or_else(|| Diagnostics::error("error: cannot create shaderc compile options"))?;

    let (env, env_version) = target_env(&request.target)?;
    options.set_target_env(env, env_version as u32);
    options.set_target_spirv(spirv_version(request.target.spirv_version)?);

    // The source already carries the override, forcing it keeps glslang from
    // second-guessing the profile
    if request.version.source == VersionSource::Override {
        let version = request.version.version;
        options.set_forced_version_profile(u32::from(version.number), glsl_profile(version.profile));
    }

    for (name, value) in request.definitions.iter() {
        options.add_macro_definition(name, Some(value));
    }

    set_limits(&mut options, &request.limits);

    if request.debug_info.flags().contains(DebugInfoFlags::EMBED_SOURCE) {
        options.set_generate_debug_info();
    }

    Ok(options)
}

fn shader_kind(stage: Stage) -> ShaderKind {
    match stage {
        Stage::Unspecified | Stage::Vertex => ShaderKind::Vertex,
        Stage::Fragment => ShaderKind::Fragment,
        Stage::Geometry => ShaderKind::Geometry,
        Stage::TessellationControl => ShaderKind::TessControl,
        Stage::TessellationEvaluation => ShaderKind::TessEvaluation,
        Stage::Compute => ShaderKind::Compute,
        Stage::RayGeneration => ShaderKind::RayGeneration,
        Stage::RayAnyHit => ShaderKind::AnyHit,
        Stage::RayClosestHit => ShaderKind::ClosestHit,
        Stage::RayMiss => ShaderKind::Miss,
        Stage::RayIntersection => ShaderKind::Intersection,
        Stage::RayCallable => ShaderKind::Callable,
        Stage::MeshTask => ShaderKind::Task,
        Stage::Mesh => ShaderKind::Mesh,
    }
}

fn target_env(target: &TargetEnvironment) -> Result<(TargetEnv, EnvVersion), Diagnostics> {
    let Version { major, minor } = target.api_version;
    match (target.api, major, minor) {
        (TargetApi::OpenGl, 4, 5) => Ok((TargetEnv::OpenGL, EnvVersion::OpenGL4_5)),
        (TargetApi::Vulkan, 1, 0) => Ok((TargetEnv::Vulkan, EnvVersion::Vulkan1_0)),
        (TargetApi::Vulkan, 1, 1) => Ok((TargetEnv::Vulkan, EnvVersion::Vulkan1_1)),
        (TargetApi::Vulkan, 1, 2) => Ok((TargetEnv::Vulkan, EnvVersion::Vulkan1_2)),
        _ => Err(Diagnostics::error(format!("error: unsupported target {}", target))),
    }
}

fn spirv_version(version: Version) -> Result<SpirvVersion, Diagnostics> {
    match (version.major, version.minor) {
        (1, 0) => Ok(SpirvVersion::V1_0),
        (1, 1) => Ok(SpirvVersion::V1_1),
        (1, 2) => Ok(SpirvVersion::V1_2),
        (1, 3) => Ok(SpirvVersion::V1_3),
        (1, 4) => Ok(SpirvVersion::V1_4),
        (1, 5) => Ok(SpirvVersion::V1_5),
        _ => Err(Diagnostics::error(format!("error: unsupported SPIR-V version {}", version))),
    }
}

fn glsl_profile(profile: Profile) -> GlslProfile {
    match profile {
        Profile::None => GlslProfile::None,
        Profile::Core => GlslProfile::Core,
        Profile::Compatibility => GlslProfile::Compatibility,
        Profile::Es => GlslProfile::Es,
    }
}

fn set_limits(options: &mut CompileOptions, limits: &ResourceLimits) {
    let value = |limit: u32| i32::try_from(limit).unwrap_or(i32::MAX);
    let [x, y, z] = limits.max_compute_work_group_size;

    options.set_limit(Limit::MaxDrawBuffers, value(limits.max_draw_buffers));
    options.set_limit(Limit::MaxVertexAttribs, value(limits.max_vertex_attribs));
    options.set_limit(
        Limit::MaxCombinedTextureImageUnits,
        value(limits.max_combined_texture_image_units),
    );
    options.set_limit(Limit::MaxComputeWorkGroupSizeX, value(x));
    options.set_limit(Limit::MaxComputeWorkGroupSizeY, value(y));
    options.set_limit(Limit::MaxComputeWorkGroupSizeZ, value(z));
}

/// glslang checks each work group dimension but not their product.
fn check_invocations(artifact: &CompilationArtifact, limits: &ResourceLimits) -> Result<(), Diagnostics> {
    let Some(size) = validation::local_size(artifact.as_binary()) else {
        return Ok(());
    };

    let invocations = size.iter().map(|&s| u64::from(s)).product::<u64>();
    if invocations > u64::from(limits.max_compute_work_group_invocations) {
        return Err(Diagnostics::error(format!(
            "error: workgroup size {:?} has {} invocations, the limit is {}",
            size, invocations, limits.max_compute_work_group_invocations
        )));
    }
    Ok(())
}

fn warnings(artifact: &CompilationArtifact) -> Diagnostics {
    if artifact.get_num_warnings() == 0 {
        return Diagnostics::new();
    }
    parse_log(&artifact.get_warning_messages(), Severity::Warning)
}

/// Split a glslang message log into diagnostics, one per line.
///
/// Lines mentioning `warning:` are warnings, `error:` lines errors, anything
/// else gets `fallback`.
fn parse_log(log: &str, fallback: Severity) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    for line in log.lines().map(str::trim_end).filter(|line| !line.is_empty()) {
        let severity = if line.contains("warning:") {
            Severity::Warning
        } else if line.contains("error:") {
            Severity::Error
        } else {
            fallback
        };
        diagnostics.push(severity, line);
    }

    if fallback == Severity::Error && !diagnostics.has_errors() {
        diagnostics.push(Severity::Error, "error: compilation failed");
    }
    diagnostics
}
