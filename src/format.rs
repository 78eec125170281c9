//! Shader formats and converter feature flags

use std::fmt;

/// Shader format accepted or produced by a converter.
///
/// Only `Glsl` input and `Spirv` output are understood here, the remaining
/// variants exist so callers can describe (and get rejected for) other
/// formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Unspecified,
    Glsl,
    Spirv,
    SpirvAssembly,
    Hlsl,
    Msl,
    Wgsl,
    Dxil,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Unspecified => "Unspecified",
            Format::Glsl => "Glsl",
            Format::Spirv => "Spirv",
            Format::SpirvAssembly => "SpirvAssembly",
            Format::Hlsl => "Hlsl",
            Format::Msl => "Msl",
            Format::Wgsl => "Wgsl",
            Format::Dxil => "Dxil",
        };
        f.write_str(name)
    }
}

bitflags::bitflags! {
    /// Operations a converter supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConverterFeatures: u32 {
        const VALIDATE_DATA = 1 << 0;
        const VALIDATE_FILE = 1 << 1;
        const CONVERT_DATA = 1 << 2;
        const CONVERT_FILE_TO_DATA = 1 << 3;
        const CONVERT_FILE_TO_FILE = 1 << 4;
        const CONVERT_DATA_TO_FILE = 1 << 5;
        /// Accepts preprocessor definitions through `set_definitions()`
        const PREPROCESS_DEFINITIONS = 1 << 6;
        /// Accepts `set_debug_info_level()`
        const DEBUG_INFO = 1 << 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_is_unspecified() {
        assert_eq!(Format::default(), Format::Unspecified);
        assert_eq!(Format::Spirv.to_string(), "Spirv");
    }

    #[test]
    fn test_features_all_contains_validation() {
        let all = ConverterFeatures::all();
        assert!(all.contains(ConverterFeatures::VALIDATE_DATA | ConverterFeatures::VALIDATE_FILE));
        assert!(all.contains(ConverterFeatures::DEBUG_INFO));
    }
}
