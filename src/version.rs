//! GLSL version negotiation
//!
//! Picks the effective language version from an explicit override, the
//! `#version` directive found in the source, or the implicit 1.10 default,
//! in that order of precedence.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::ConfigError;

/// Lowest GLSL version that can be compiled to SPIR-V. Older sources can only
/// be validated.
pub const MIN_COMPILE_VERSION: u16 = 140;

/// GLSL profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Profile {
    /// Versions before 1.50 have no profile
    #[default]
    None,
    Core,
    Compatibility,
    /// OpenGL ES
    Es,
}

/// A GLSL version together with its profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlslVersion {
    pub number: u16,
    pub profile: Profile,
}

impl GlslVersion {
    /// GLSL 1.10, used when neither an override nor a directive is present.
    pub const DEFAULT: GlslVersion = GlslVersion {
        number: 110,
        profile: Profile::None,
    };

    pub const fn new(number: u16, profile: Profile) -> Self {
        Self { number, profile }
    }

    /// Whether the version is new enough for SPIR-V compilation.
    pub fn is_compilable(&self) -> bool {
        self.number >= MIN_COMPILE_VERSION
    }

    /// Parse the body of a `#version` directive as written in a source.
    ///
    /// More lenient than [`FromStr`]: follows the GLSL rules where a missing
    /// profile means core for 1.50 and up, `100` is always ES and
    /// `compatibility` may be spelled out.
    pub fn from_directive(body: &str) -> Option<GlslVersion> {
        let mut parts = body.split_whitespace();
        let number: u16 = parts.next()?.parse().ok()?;
        let profile = match parts.next() {
            None if number == 100 => Profile::Es,
            None if number >= 150 => Profile::Core,
            None => Profile::None,
            Some("core") if number >= 150 => Profile::Core,
            Some("compatibility") if number >= 150 => Profile::Compatibility,
            Some("es") if is_es_number(number) => Profile::Es,
            Some(_) => return None,
        };
        if parts.next().is_some() {
            return None;
        }

        let version = GlslVersion::new(number, profile);
        if profile == Profile::Es || is_desktop_number(number) {
            Some(version)
        } else {
            None
        }
    }
}

fn is_desktop_number(number: u16) -> bool {
    matches!(number, 110 | 120 | 130 | 140 | 150 | 330)
        || ((400..=460).contains(&number) && number % 10 == 0)
}

fn is_es_number(number: u16) -> bool {
    matches!(number, 100 | 300 | 310 | 320)
}

impl fmt::Display for GlslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.profile {
            Profile::None => write!(f, "{}", self.number),
            Profile::Core => write!(f, "{} core", self.number),
            Profile::Compatibility => write!(f, "{} compatibility", self.number),
            Profile::Es => write!(f, "{} es", self.number),
        }
    }
}

impl FromStr for GlslVersion {
    type Err = ConfigError;

    /// Parse a version override token.
    ///
    /// Accepts exactly `110`, `120`, `130`, `140`, `150`, `330`, `400` to `460`
    /// (each optionally followed by ` core` from `150` on, without it meaning
    /// the compatibility profile) and `100 es`, `300 es`, `310 es`, `320 es`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ConfigError::UnknownVersion(s.to_string());

        let (number, suffix) = match s.split_once(' ') {
            Some((number, suffix)) => (number, Some(suffix)),
            None => (s, None),
        };
        // Reject things like "+450" or "0450" that parse as numbers
        if number.len() != 3 || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unknown());
        }
        let number: u16 = number.parse().map_err(|_| unknown())?;

        let profile = match suffix {
            None if matches!(number, 110 | 120 | 130 | 140) => Profile::None,
            None if number >= 150 && is_desktop_number(number) => Profile::Compatibility,
            Some("core") if number >= 150 && is_desktop_number(number) => Profile::Core,
            Some("es") if is_es_number(number) => Profile::Es,
            _ => return Err(unknown()),
        };

        Ok(GlslVersion::new(number, profile))
    }
}

/// Where a resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    Override,
    Directive,
    Default,
}

/// Effective GLSL version for a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: GlslVersion,
    pub source: VersionSource,
}

/// Pick the effective version. Override wins over the directive, which wins
/// over the 1.10 default.
pub fn negotiate_version(
    directive: Option<GlslVersion>,
    override_version: Option<GlslVersion>,
) -> ResolvedVersion {
    match (override_version, directive) {
        (Some(version), _) => ResolvedVersion {
            version,
            source: VersionSource::Override,
        },
        (None, Some(version)) => ResolvedVersion {
            version,
            source: VersionSource::Directive,
        },
        (None, None) => ResolvedVersion {
            version: GlslVersion::DEFAULT,
            source: VersionSource::Default,
        },
    }
}

/// A `#version` directive located in a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDirective {
    /// Byte range of the directive, from `#` up to (not including) the newline
    pub span: Range<usize>,
    /// Parsed version, `None` if the directive body isn't understood
    pub version: Option<GlslVersion>,
}

/// Find the `#version` directive, which has to be the first thing in a
/// source apart from whitespace and comments.
pub fn scan_version_directive(source: &str) -> Option<VersionDirective> {
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
            }
            b'#' => {
                let mut end = source[i..].find('\n').map_or(bytes.len(), |end| i + end);
                if source[..end].ends_with('\r') {
                    end -= 1;
                }
                let line = source[i + 1..end].trim_start();
                let body = line.strip_prefix("version")?;
                if !body.starts_with(|c: char| c.is_ascii_whitespace()) {
                    return None;
                }
                let version = GlslVersion::from_directive(body);
                if version.is_none() {
                    log::debug!("Unrecognized #version directive: {:?}", line);
                }
                return Some(VersionDirective {
                    span: i..end,
                    version,
                });
            }
            _ => return None,
        }
    }

    None
}

/// Force `version` into the source.
///
/// An existing directive is replaced in place. Otherwise a directive is
/// prepended, followed by a `#line` so the original lines keep their numbers.
pub fn apply_version_override(
    source: &str,
    directive: Option<&VersionDirective>,
    version: GlslVersion,
) -> String {
    match directive {
        Some(directive) => {
            let mut out = String::with_capacity(source.len() + 16);
            out.push_str(&source[..directive.span.start]);
            out.push_str(&format!("#version {}", version));
            out.push_str(&source[directive.span.end..]);
            out
        }
        None => format!("#version {}\n#line 1\n{}", version, source),
    }
}
