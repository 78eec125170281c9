//! Pure Rust backend built on naga's GLSL frontend and SPIR-V writer
//!
//! Used when shaderc isn't available. naga understands a subset of what the
//! converter can negotiate: GLSL 440/450/460 core sources for the vertex,
//! fragment and compute stages. Everything else is reported back as a
//! diagnostic, verbatim. The target API doesn't change naga's output, only
//! the SPIR-V version does.

use std::path::Path;

use ::naga::back::spv;
use ::naga::front::glsl;
use ::naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use ::naga::{ArraySize, Binding, Handle, Module, ShaderStage, Type, TypeInner};

use super::{Backend, ConversionRequest, Diagnostics, Severity};
use crate::config::ResourceLimits;
use crate::debug_info::DebugInfoFlags;
use crate::shader::words_to_bytes;
use crate::stage::Stage;

/// Backend wrapping naga.
#[derive(Debug, Clone, Copy, Default)]
pub struct NagaBackend;

impl NagaBackend {
    pub fn new() -> Self {
        Self
    }

    /// Parse and validate the request's source.
    fn parse(&self, request: &ConversionRequest) -> Result<(Module, ModuleInfo), Diagnostics> {
        let stage = naga_stage(request.stage).ok_or_else(|| {
            Diagnostics::error(format!(
                "error: {} shaders are not supported by the naga backend",
                request.stage
            ))
        })?;

        let mut options = glsl::Options::from(stage);
        for (name, value) in request.definitions.iter() {
            options.defines.insert(name.to_string(), value.to_string());
        }

        let mut frontend = glsl::Frontend::default();
        let module = frontend
            .parse(&options, &request.source)
            .map_err(|e| Diagnostics::error(e.emit_to_string(&request.source)))?;

        check_limits(&module, &request.limits)?;

        let info = Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|e| Diagnostics::error(e.emit_to_string(&request.source)))?;

        Ok((module, info))
    }
}

impl Backend for NagaBackend {
    fn name(&self) -> &str {
        "naga"
    }

    fn validate(&self, request: &ConversionRequest) -> Diagnostics {
        match self.parse(request) {
            Ok(_) => Diagnostics::new(),
            Err(diagnostics) => diagnostics,
        }
    }

    fn compile(&self, request: &ConversionRequest) -> Result<Vec<u8>, Diagnostics> {
        let (module, info) = self.parse(request)?;

        let spirv_version = request.target.spirv_version;
        let mut flags = spv::WriterFlags::LABEL_VARYINGS | spv::WriterFlags::CLAMP_FRAG_DEPTH;

        let debug = request.debug_info.flags();
        let file_name = request.filename.as_deref().unwrap_or(Path::new(""));
        let debug_info = if debug.contains(DebugInfoFlags::EMBED_SOURCE) {
            flags |= spv::WriterFlags::DEBUG;
            Some(spv::DebugInfo {
                source_code: &request.source,
                file_name,
            })
        } else {
            None
        };
        if debug.contains(DebugInfoFlags::PROCESSING_HISTORY) {
            log::debug!("naga does not record processing history, skipping it");
        }

        let options = spv::Options {
            lang_version: (spirv_version.major, spirv_version.minor),
            flags,
            debug_info,
            ..Default::default()
        };

        let words = spv::write_vec(&module, &info, &options, None)
            .map_err(|e| Diagnostics::error(format!("error: {}", e)))?;

        log::debug!(
            "naga emitted {} words of SPIR-V {}",
            words.len(),
            spirv_version
        );
        Ok(words_to_bytes(&words))
    }
}

fn naga_stage(stage: Stage) -> Option<ShaderStage> {
    match stage {
        Stage::Vertex => Some(ShaderStage::Vertex),
        Stage::Fragment => Some(ShaderStage::Fragment),
        Stage::Compute => Some(ShaderStage::Compute),
        _ => None,
    }
}

/// Resource limits naga doesn't know about.
fn check_limits(module: &Module, limits: &ResourceLimits) -> Result<(), Diagnostics> {
    let mut diagnostics = Diagnostics::new();

    for entry in &module.entry_points {
        let function = &entry.function;
        match entry.stage {
            ShaderStage::Vertex => {
                for argument in &function.arguments {
                    for location in locations(module, argument.ty, argument.binding.as_ref()) {
                        if location >= limits.max_vertex_attribs {
                            diagnostics.push(
                                Severity::Error,
                                format!(
                                    "error: vertex input location {} exceeds max_vertex_attribs ({})",
                                    location, limits.max_vertex_attribs
                                ),
                            );
                        }
                    }
                }
            }
            ShaderStage::Fragment => {
                if let Some(result) = &function.result {
                    for location in locations(module, result.ty, result.binding.as_ref()) {
                        if location >= limits.max_draw_buffers {
                            diagnostics.push(
                                Severity::Error,
                                format!(
                                    "error: fragment output location {} exceeds max_draw_buffers ({})",
                                    location, limits.max_draw_buffers
                                ),
                            );
                        }
                    }
                }
            }
            ShaderStage::Compute => {
                let size = entry.workgroup_size;
                let invocations = size.iter().map(|&s| u64::from(s)).product::<u64>();
                let too_large = size
                    .iter()
                    .zip(limits.max_compute_work_group_size.iter())
                    .any(|(s, max)| s > max);
                if too_large || invocations > u64::from(limits.max_compute_work_group_invocations) {
                    diagnostics.push(
                        Severity::Error,
                        format!(
                            "error: workgroup size {:?} of {} exceeds the limits {:?} ({} invocations)",
                            size, entry.name, limits.max_compute_work_group_size,
                            limits.max_compute_work_group_invocations
                        ),
                    );
                }
            }
            _ => {}
        }
    }

    let image_units: u32 = module
        .global_variables
        .iter()
        .map(|(_, global)| image_count(module, global.ty))
        .sum();
    if image_units > limits.max_combined_texture_image_units {
        diagnostics.push(
            Severity::Error,
            format!(
                "error: {} texture image units in use, max_combined_texture_image_units is {}",
                image_units, limits.max_combined_texture_image_units
            ),
        );
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// User locations of an entry point argument or result, looking through
/// structs naga uses to group several varyings.
fn locations(module: &Module, ty: Handle<Type>, binding: Option<&Binding>) -> Vec<u32> {
    match (binding, &module.types[ty].inner) {
        (Some(&Binding::Location { location, .. }), _) => vec![location],
        (None, TypeInner::Struct { members, .. }) => members
            .iter()
            .flat_map(|member| locations(module, member.ty, member.binding.as_ref()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Texture units taken by a global of type `ty`.
fn image_count(module: &Module, ty: Handle<Type>) -> u32 {
    match &module.types[ty].inner {
        TypeInner::Image { .. } => 1,
        TypeInner::Array { base, size, .. } | TypeInner::BindingArray { base, size } => {
            let count = match size {
                ArraySize::Constant(count) => count.get(),
                _ => 1,
            };
            count.saturating_mul(image_count(module, *base))
        }
        _ => 0,
    }
}
