//! Target environment negotiation
//!
//! Parses output version strings of the form `<target> [spv<major>.<minor>]`.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Graphics API the compiled module is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetApi {
    OpenGl,
    Vulkan,
}

/// A `major.minor` version pair, used both for APIs and for SPIR-V itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Lowest SPIR-V version accepted in a `spvX.Y` suffix.
pub const MIN_SPIRV_VERSION: Version = Version::new(1, 0);
/// Highest SPIR-V version accepted in a `spvX.Y` suffix.
pub const MAX_SPIRV_VERSION: Version = Version::new(1, 5);

/// Known targets with the SPIR-V version they imply.
const TARGETS: &[(&str, TargetApi, Version, Version)] = &[
    ("opengl4.5", TargetApi::OpenGl, Version::new(4, 5), Version::new(1, 0)),
    ("vulkan1.0", TargetApi::Vulkan, Version::new(1, 0), Version::new(1, 0)),
    ("vulkan1.1", TargetApi::Vulkan, Version::new(1, 1), Version::new(1, 3)),
    ("vulkan1.2", TargetApi::Vulkan, Version::new(1, 2), Version::new(1, 5)),
];

/// Resolved target API, its version and the SPIR-V version to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetEnvironment {
    pub api: TargetApi,
    pub api_version: Version,
    pub spirv_version: Version,
}

impl Default for TargetEnvironment {
    /// Vulkan 1.0 with SPIR-V 1.0
    fn default() -> Self {
        Self {
            api: TargetApi::Vulkan,
            api_version: Version::new(1, 0),
            spirv_version: Version::new(1, 0),
        }
    }
}

impl fmt::Display for TargetEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api = match self.api {
            TargetApi::OpenGl => "opengl",
            TargetApi::Vulkan => "vulkan",
        };
        write!(f, "{}{} spv{}", api, self.api_version, self.spirv_version)
    }
}

impl FromStr for TargetEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        negotiate_target(Some(s))
    }
}

/// Resolve the target environment from an optional output version string.
///
/// An absent or empty string gives the Vulkan 1.0 default. An explicit
/// `spvX.Y` has to be within 1.0 to 1.5 and replaces the implicit SPIR-V
/// version, even when it is lower than what the target implies.
pub fn negotiate_target(version: Option<&str>) -> Result<TargetEnvironment, ConfigError> {
    let version = match version {
        Some(version) if !version.is_empty() => version,
        _ => return Ok(TargetEnvironment::default()),
    };

    let (target, spirv) = match version.split_once(' ') {
        Some((target, spirv)) => (target, Some(spirv)),
        None => (version, None),
    };

    let &(_, api, api_version, implicit_spirv) = TARGETS
        .iter()
        .find(|(name, ..)| *name == target)
        .ok_or_else(|| ConfigError::UnknownTarget(target.to_string()))?;

    let spirv_version = match spirv {
        None => implicit_spirv,
        Some(spirv) => parse_spirv_version(spirv)?,
    };

    Ok(TargetEnvironment {
        api,
        api_version,
        spirv_version,
    })
}

fn parse_spirv_version(s: &str) -> Result<Version, ConfigError> {
    let malformed = || ConfigError::MalformedSpirvVersion(s.to_string());

    let (major, minor) = s
        .strip_prefix("spv")
        .and_then(|v| v.split_once('.'))
        .ok_or_else(malformed)?;
    if major.is_empty()
        || minor.is_empty()
        || !major.bytes().chain(minor.bytes()).all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }

    let version = Version::new(
        major.parse().map_err(|_| malformed())?,
        minor.parse().map_err(|_| malformed())?,
    );
    if version < MIN_SPIRV_VERSION || version > MAX_SPIRV_VERSION {
        return Err(ConfigError::SpirvVersionOutOfRange(s.to_string()));
    }

    Ok(version)
}
