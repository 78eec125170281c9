//! End-to-end conversion tests
//!
//! The recording backend covers negotiation and orchestration. shaderc and
//! naga cover what actually comes out of a real compiler.

use std::fs;
use std::path::PathBuf;

use glsl_converter::{
    BackendRuntime, CompiledModule, ConfigError, Configuration, ConvertError, DefinitionSet,
    Format, GlslConverter, GlslVersion, Mode, NagaBackend, Profile, RecordingBackend, Stage,
    TargetApi, TargetEnvironment, ValidationReport, Version, VersionSource,
};
use pretty_assertions::assert_eq;

const FRAGMENT_330: &str = "#version 330 core\nvoid main(){}";

const FRAGMENT_450: &str = "#version 450 core
layout(location = 0) out vec4 color;
void main() {
    color = vec4(1.0, 0.5, 0.25, 1.0);
}
";

const COMPUTE_450: &str = "#version 450 core
layout(local_size_x = GROUP_SIZE) in;
void main() {}
";

/// Unique path in the temp directory, removed on drop.
struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str) -> Self {
        Self(std::env::temp_dir().join(format!("glsl_converter_{}_{}", std::process::id(), name)))
    }

    fn with_contents(name: &str, contents: &str) -> Self {
        let file = Self::new(name);
        fs::write(&file.0, contents).unwrap();
        file
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

fn contains_text(bytes: &[u8], text: &str) -> bool {
    bytes.windows(text.len()).any(|w| w == text.as_bytes())
}

#[test]
fn test_validate_fragment_file() {
    let _runtime = BackendRuntime::initialize();
    let input = TempFile::with_contents("x.frag", FRAGMENT_330);
    let mut converter = GlslConverter::new(RecordingBackend::new());

    let report = converter.validate_file(Stage::Unspecified, &input.0);
    assert_eq!(<(bool, String)>::from(report), (true, String::new()));

    let request = converter.backend().last_request().unwrap();
    assert_eq!(request.stage, Stage::Fragment);
    assert_eq!(request.version.version, GlslVersion::new(330, Profile::Core));
    assert_eq!(request.version.source, VersionSource::Directive);
    assert_eq!(request.mode, Mode::ValidateOnly);
    assert_eq!(request.filename.as_deref(), Some(input.0.as_path()));
}

#[test]
fn test_validate_missing_file() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(RecordingBackend::new());

    let report = converter.validate_file(Stage::Unspecified, "/nonexistent/shader.frag");
    assert_eq!(report, ValidationReport { accepted: false, diagnostics: String::new() });
    assert!(converter.backend().requests().is_empty());
}

#[test]
fn test_override_ignores_directive() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(RecordingBackend::new());

    for token in ["110", "150 core", "330", "400", "460 core", "310 es"] {
        converter.set_input_format(Format::Glsl, token).unwrap();
        converter.validate_data(Stage::Vertex, FRAGMENT_330.as_bytes());

        let request = converter.backend().last_request().unwrap();
        assert_eq!(request.version.source, VersionSource::Override);
        let version = token.parse::<GlslVersion>().unwrap();
        assert_eq!(request.version.version, version);
        // A bare "330" is the compatibility profile and is written out as such
        assert!(request.source.starts_with(&format!("#version {}\n", version)), "{}", request.source);
    }
}

#[test]
fn test_target_reaches_backend() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(RecordingBackend::new());
    converter.set_output_format(Format::Spirv, "vulkan1.1 spv1.4").unwrap();

    let module = converter.compile_data(Stage::Fragment, FRAGMENT_330.as_bytes()).unwrap();
    assert_eq!(module.spirv_version, Version::new(1, 4));

    let request = converter.backend().last_request().unwrap();
    assert_eq!(
        request.target,
        TargetEnvironment {
            api: TargetApi::Vulkan,
            api_version: Version::new(1, 1),
            spirv_version: Version::new(1, 4),
        }
    );
    assert_eq!(request.mode, Mode::Compile);
}

#[test]
fn test_definitions_with_user_vulkan() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(RecordingBackend::new());
    converter.set_definitions([("VULKAN", "2"), ("LIGHTS", "4")]).unwrap();

    converter.validate_data(Stage::Vertex, FRAGMENT_330.as_bytes());
    converter.validate_data(Stage::Vertex, FRAGMENT_330.as_bytes());

    let requests = converter.backend().requests();
    assert_eq!(requests[0].definitions, requests[1].definitions);
    let pairs: Vec<_> = requests[0].definitions.iter().collect();
    assert_eq!(pairs, vec![("VULKAN", "2"), ("LIGHTS", "4")]);

    converter.set_output_format(Format::Unspecified, "opengl4.5").unwrap();
    converter.validate_data(Stage::Vertex, FRAGMENT_330.as_bytes());
    let expected = DefinitionSet::from_pairs([("VULKAN", "2"), ("LIGHTS", "4"), ("GL_SPIRV", "100")]).unwrap();
    assert_eq!(converter.backend().last_request().unwrap().definitions, expected);
}

#[test]
fn test_debug_info_embeds_source() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(RecordingBackend::new());
    converter.set_output_format(Format::Spirv, "vulkan1.0").unwrap();

    let plain = converter.compile_data(Stage::Fragment, FRAGMENT_330.as_bytes()).unwrap();
    assert!(!plain.as_bytes().is_empty());
    assert_eq!(plain.embedded_source(), None);

    converter.set_debug_info_level("1");
    let debug = converter.compile_data(Stage::Fragment, FRAGMENT_330.as_bytes()).unwrap();
    assert_eq!(debug.embedded_source().as_deref(), Some(FRAGMENT_330));
    assert_ne!(plain.id(), debug.id());
}

#[test]
fn test_old_glsl_compiles_only_from_140() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(RecordingBackend::new());

    let err = converter
        .convert_data_to_data(Stage::Vertex, b"#version 130\nvoid main(){}")
        .unwrap_err();
    assert!(matches!(err, ConvertError::Resolution(_)), "{:?}", err);

    // Validation has no minimum version
    let report = converter.validate_data(Stage::Vertex, b"#version 130\nvoid main(){}");
    assert!(report.accepted);

    let bytes = converter
        .convert_data_to_data(Stage::Vertex, b"#version 140\nvoid main(){}")
        .unwrap();
    assert!(!bytes.is_empty());
}

#[test]
fn test_non_glsl_input_rejected() {
    let mut converter = GlslConverter::new(RecordingBackend::new());
    assert_eq!(
        converter.set_input_format(Format::Spirv, ""),
        Err(ConfigError::UnsupportedInputFormat(Format::Spirv))
    );
    assert_eq!(converter.input_version(), None);
    assert!(converter.backend().requests().is_empty());
}

#[test]
fn test_convert_file_to_file() {
    let _runtime = BackendRuntime::initialize();
    let input = TempFile::with_contents("lighting.frag.glsl", FRAGMENT_330);
    let output = TempFile::new("lighting.spv");
    let mut converter = GlslConverter::new(RecordingBackend::new());
    converter.set_output_format(Format::Spirv, "vulkan1.2").unwrap();

    converter.convert_file_to_file(Stage::Unspecified, &input.0, &output.0).unwrap();

    let module = CompiledModule::new(Stage::Fragment, fs::read(&output.0).unwrap()).unwrap();
    assert_eq!(module.spirv_version, Version::new(1, 5));
    assert_eq!(converter.backend().last_request().unwrap().stage, Stage::Fragment);
}

#[test]
fn test_convert_failure_writes_nothing() {
    let _runtime = BackendRuntime::initialize();
    let output = TempFile::new("never.spv");
    let mut converter = GlslConverter::new(RecordingBackend::new());

    let err = converter
        .convert_file_to_file(Stage::Unspecified, "/nonexistent/shader.vert", &output.0)
        .unwrap_err();
    assert!(matches!(err, ConvertError::Io { .. }), "{:?}", err);

    let err = converter
        .convert_data_to_file(Stage::Vertex, b"#version 120\nvoid main(){}", &output.0)
        .unwrap_err();
    assert!(matches!(err, ConvertError::Resolution(_)), "{:?}", err);
    assert!(!output.0.exists());
}

#[test]
fn test_with_configuration_defaults() {
    let _runtime = BackendRuntime::initialize();
    let config = Configuration::from_json_str(
        r#"{"input_version": "450 core", "output_version": "vulkan1.1", "debug_info_level": "1"}"#,
    )
    .unwrap();
    let mut converter = GlslConverter::with_configuration(RecordingBackend::new(), &config).unwrap();

    converter.validate_data(Stage::Vertex, FRAGMENT_330.as_bytes());
    let request = converter.backend().last_request().unwrap();
    assert_eq!(request.version.version, GlslVersion::new(450, Profile::Core));
    assert_eq!(request.target.spirv_version, Version::new(1, 3));
    assert_eq!(request.debug_info.to_string(), "1");

    // Programmatic settings win over the store
    converter.set_output_format(Format::Unspecified, "").unwrap();
    converter.validate_data(Stage::Vertex, FRAGMENT_330.as_bytes());
    assert_eq!(converter.backend().last_request().unwrap().target, TargetEnvironment::default());
}

#[test]
fn test_runtime_required() {
    // Tests run in parallel and share the runtime, so only check the error
    // path when no other test holds a handle
    if BackendRuntime::is_initialized() {
        return;
    }
    let mut converter = GlslConverter::new(RecordingBackend::new());
    match converter.compile_data(Stage::Vertex, FRAGMENT_330.as_bytes()) {
        Err(ConvertError::NotInitialized) => {}
        // Another test initialized the runtime in the meantime
        Ok(_) => {}
        Err(e) => panic!("unexpected error: {}", e),
    }
}

#[test]
fn test_naga_validates_fragment() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(NagaBackend::new());

    let report = converter.validate_data(Stage::Fragment, FRAGMENT_450.as_bytes());
    assert_eq!(report, ValidationReport { accepted: true, diagnostics: String::new() });
}

#[test]
fn test_naga_reports_errors() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(NagaBackend::new());

    let report = converter.validate_data(
        Stage::Fragment,
        b"#version 450 core\nvoid main() {\n    undeclared = 1.0;\n}\n",
    );
    assert!(!report.accepted);
    assert!(!report.diagnostics.is_empty());

    let err = converter
        .convert_data_to_data(Stage::Fragment, b"#version 450 core\nvoid main() { undeclared = 1.0; }\n")
        .unwrap_err();
    assert!(err.diagnostics().is_some_and(|d| !d.is_empty()), "{:?}", err);
}

#[test]
fn test_naga_unsupported_stage() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(NagaBackend::new());

    let report = converter.validate_data(Stage::Geometry, FRAGMENT_450.as_bytes());
    assert!(!report.accepted);
    assert!(report.diagnostics.contains("geometry"), "{}", report.diagnostics);
}

#[test]
fn test_naga_compiles_for_target() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(NagaBackend::new());
    converter.set_output_format(Format::Spirv, "vulkan1.1").unwrap();

    let module = converter.compile_data(Stage::Fragment, FRAGMENT_450.as_bytes()).unwrap();
    assert_eq!(module.spirv_version, Version::new(1, 3));
    assert!(module.words().len() > 5);
}

#[test]
fn test_naga_debug_info() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(NagaBackend::new());
    converter.set_output_format(Format::Spirv, "vulkan1.0").unwrap();

    let plain = converter.convert_data_to_data(Stage::Fragment, FRAGMENT_450.as_bytes()).unwrap();
    assert!(!contains_text(&plain, "vec4(1.0, 0.5, 0.25, 1.0)"));

    converter.set_debug_info_level("1");
    let debug = converter.compile_data(Stage::Fragment, FRAGMENT_450.as_bytes()).unwrap();
    assert!(contains_text(debug.as_bytes(), "vec4(1.0, 0.5, 0.25, 1.0)"));
}

#[test]
fn test_naga_definitions() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(NagaBackend::new());
    converter.set_output_format(Format::Spirv, "").unwrap();

    // GROUP_SIZE is undefined
    assert!(converter.compile_data(Stage::Compute, COMPUTE_450.as_bytes()).is_err());

    converter.set_definitions([("GROUP_SIZE", "64")]).unwrap();
    let module = converter.compile_data(Stage::Compute, COMPUTE_450.as_bytes()).unwrap();
    assert_eq!(module.stage, Stage::Compute);

    converter.set_definitions([("GROUP_SIZE", "4096")]).unwrap();
    let err = converter.compile_data(Stage::Compute, COMPUTE_450.as_bytes()).unwrap_err();
    assert!(err.diagnostics().is_some_and(|d| d.contains("workgroup size")), "{:?}", err);
}

#[test]
fn test_naga_enforces_draw_buffers() {
    let _runtime = BackendRuntime::initialize();
    let source = b"#version 450 core
layout(location = 0) out vec4 albedo;
layout(location = 1) out vec4 normal;
layout(location = 2) out vec4 emission;
void main() {
    albedo = vec4(1.0);
    normal = vec4(0.0);
    emission = vec4(0.5);
}
";
    let mut converter = GlslConverter::new(NagaBackend::new());
    assert!(converter.validate_data(Stage::Fragment, source).accepted);

    let mut config = Configuration::new();
    config.set("max_draw_buffers", 2i64);
    let mut converter = GlslConverter::with_configuration(NagaBackend::new(), &config).unwrap();
    let report = converter.validate_data(Stage::Fragment, source);
    assert!(!report.accepted);
    assert!(report.diagnostics.contains("location 2 exceeds max_draw_buffers"), "{}", report.diagnostics);
}

#[test]
fn test_naga_enforces_vertex_attribs() {
    let _runtime = BackendRuntime::initialize();
    let source = b"#version 450 core
layout(location = 0) in vec3 position;
layout(location = 4) in vec2 uv;
void main() {
    gl_Position = vec4(position.xy + uv, position.z, 1.0);
}
";
    let mut config = Configuration::new();
    config.set("max_vertex_attribs", 4i64);
    let mut converter = GlslConverter::with_configuration(NagaBackend::new(), &config).unwrap();
    converter.set_output_format(Format::Spirv, "").unwrap();

    let err = converter.compile_data(Stage::Vertex, source).unwrap_err();
    assert!(err.diagnostics().is_some_and(|d| d.contains("max_vertex_attribs")), "{:?}", err);
}

#[test]
fn test_naga_diagnoses_unrecognized_directive() {
    let _runtime = BackendRuntime::initialize();
    let mut converter = GlslConverter::new(NagaBackend::new());
    converter.set_output_format(Format::Spirv, "").unwrap();

    let err = converter
        .compile_data(Stage::Fragment, b"#version 300\nvoid main() {}\n")
        .unwrap_err();
    assert!(matches!(err, ConvertError::Backend { .. }), "{:?}", err);
}

#[test]
fn test_naga_implicit_target_definition() {
    let _runtime = BackendRuntime::initialize();
    let source = b"#version 450 core\n#ifndef VULKAN\n#error not a Vulkan target\n#endif\nvoid main() {}\n";
    let mut converter = GlslConverter::new(NagaBackend::new());

    assert!(converter.validate_data(Stage::Fragment, source).accepted);

    converter.set_output_format(Format::Unspecified, "opengl4.5").unwrap();
    assert!(!converter.validate_data(Stage::Fragment, source).accepted);
}

#[cfg(feature = "shaderc")]
mod shaderc {
    use super::*;
    use glsl_converter::ShadercBackend;

    fn converter() -> GlslConverter<ShadercBackend> {
        GlslConverter::new(ShadercBackend::new().unwrap())
    }

    #[test]
    fn test_validate_fragment_file() {
        let _runtime = BackendRuntime::initialize();
        let input = TempFile::with_contents("shaderc_x.frag", FRAGMENT_330);
        let mut converter = converter();

        let report = converter.validate_file(Stage::Unspecified, &input.0);
        assert_eq!(<(bool, String)>::from(report), (true, String::new()));
    }

    #[test]
    fn test_debug_info_embeds_source() {
        let _runtime = BackendRuntime::initialize();
        let input = TempFile::with_contents("shaderc_embed.frag", FRAGMENT_330);
        let mut converter = converter();
        converter.set_output_format(Format::Spirv, "vulkan1.0").unwrap();

        let plain = converter.compile_file(Stage::Unspecified, &input.0).unwrap();
        assert_eq!(plain.spirv_version, Version::new(1, 0));
        assert!(!contains_text(plain.as_bytes(), FRAGMENT_330));

        converter.set_debug_info_level("1");
        let debug = converter.compile_file(Stage::Unspecified, &input.0).unwrap();
        let source = debug.embedded_source().unwrap_or_default();
        assert!(source.contains("void main(){}"), "{:?}", source);
    }

    #[test]
    fn test_compiles_for_each_target() {
        let _runtime = BackendRuntime::initialize();
        let mut converter = converter();

        for (target, spirv) in [
            ("opengl4.5", Version::new(1, 0)),
            ("vulkan1.1", Version::new(1, 3)),
            ("vulkan1.1 spv1.4", Version::new(1, 4)),
            ("vulkan1.2", Version::new(1, 5)),
        ] {
            converter.set_output_format(Format::Spirv, target).unwrap();
            let module = converter.compile_data(Stage::Fragment, FRAGMENT_450.as_bytes()).unwrap();
            assert_eq!(module.spirv_version, spirv, "{}", target);
        }
    }

    #[test]
    fn test_glsl_140_compiles() {
        let _runtime = BackendRuntime::initialize();
        let mut converter = converter();
        converter.set_output_format(Format::Spirv, "vulkan1.0").unwrap();

        let module = converter
            .compile_data(Stage::Vertex, b"#version 140\nvoid main() { gl_Position = vec4(0.0); }\n")
            .unwrap();
        assert_eq!(module.stage, Stage::Vertex);
    }

    #[test]
    fn test_geometry_and_es_sources() {
        let _runtime = BackendRuntime::initialize();
        let mut converter = converter();

        let geometry = b"#version 450 core
layout(points) in;
layout(points, max_vertices = 1) out;
void main() {
    gl_Position = gl_in[0].gl_Position;
    EmitVertex();
    EndPrimitive();
}
";
        let report = converter.validate_data(Stage::Geometry, geometry);
        assert!(report.accepted, "{}", report.diagnostics);

        let es = b"#version 310 es
precision mediump float;
layout(location = 0) out vec4 color;
void main() {
    color = vec4(1.0);
}
";
        converter.set_output_format(Format::Spirv, "vulkan1.0").unwrap();
        let module = converter.compile_data(Stage::Fragment, es).unwrap();
        assert!(module.words().len() > 5);
    }

    #[test]
    fn test_target_api_decides_builtins() {
        let _runtime = BackendRuntime::initialize();
        let source = b"#version 450 core\nvoid main() { gl_Position = vec4(float(gl_VertexIndex)); }\n";
        let mut converter = converter();

        assert!(converter.validate_data(Stage::Vertex, source).accepted);

        converter.set_output_format(Format::Unspecified, "opengl4.5").unwrap();
        let report = converter.validate_data(Stage::Vertex, source);
        assert!(!report.accepted);
        assert!(report.diagnostics.contains("gl_VertexIndex"), "{}", report.diagnostics);
    }

    #[test]
    fn test_enforces_limits() {
        let _runtime = BackendRuntime::initialize();
        let fragment = b"#version 450 core\nlayout(location = 2) out vec4 color;\nvoid main() { color = vec4(1.0); }\n";
        assert!(converter().validate_data(Stage::Fragment, fragment).accepted);

        let mut config = Configuration::new();
        config.set("max_draw_buffers", 1i64);
        let mut converter = GlslConverter::with_configuration(ShadercBackend::new().unwrap(), &config).unwrap();
        assert!(!converter.validate_data(Stage::Fragment, fragment).accepted);

        // Every dimension fits, their product doesn't
        let compute = b"#version 450 core\nlayout(local_size_x = 64, local_size_y = 32) in;\nvoid main() {}\n";
        converter.set_output_format(Format::Spirv, "").unwrap();
        let err = converter.compile_data(Stage::Compute, compute).unwrap_err();
        assert!(err.diagnostics().is_some_and(|d| d.contains("invocations")), "{:?}", err);
    }

    #[test]
    fn test_definitions_reach_preprocessor() {
        let _runtime = BackendRuntime::initialize();
        let mut converter = converter();
        converter.set_output_format(Format::Spirv, "").unwrap();
        assert!(converter.compile_data(Stage::Compute, COMPUTE_450.as_bytes()).is_err());

        converter.set_definitions([("GROUP_SIZE", "64")]).unwrap();
        let module = converter.compile_data(Stage::Compute, COMPUTE_450.as_bytes()).unwrap();
        assert_eq!(module.stage, Stage::Compute);
    }
}
