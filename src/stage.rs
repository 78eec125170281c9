//! Shader stage resolution
//!
//! Maps an explicit stage or a filename to a concrete pipeline stage.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

/// Pipeline stage a shader executes at.
///
/// `Unspecified` is only ever an input value. It is resolved to a concrete
/// stage before anything reaches a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    Unspecified,
    Vertex,
    Fragment,
    Geometry,
    TessellationControl,
    TessellationEvaluation,
    Compute,
    RayGeneration,
    RayAnyHit,
    RayClosestHit,
    RayMiss,
    RayIntersection,
    RayCallable,
    MeshTask,
    Mesh,
}

/// File extension keywords, in match order.
const STAGE_KEYWORDS: &[(&str, Stage)] = &[
    ("vert", Stage::Vertex),
    ("frag", Stage::Fragment),
    ("geom", Stage::Geometry),
    ("tesc", Stage::TessellationControl),
    ("tese", Stage::TessellationEvaluation),
    ("comp", Stage::Compute),
    ("rgen", Stage::RayGeneration),
    ("rahit", Stage::RayAnyHit),
    ("rchit", Stage::RayClosestHit),
    ("rmiss", Stage::RayMiss),
    ("rint", Stage::RayIntersection),
    ("rcall", Stage::RayCallable),
    ("task", Stage::MeshTask),
    ("mesh", Stage::Mesh),
];

impl Stage {
    /// Every concrete stage.
    pub const ALL: [Stage; 14] = [
        Stage::Vertex,
        Stage::Fragment,
        Stage::Geometry,
        Stage::TessellationControl,
        Stage::TessellationEvaluation,
        Stage::Compute,
        Stage::RayGeneration,
        Stage::RayAnyHit,
        Stage::RayClosestHit,
        Stage::RayMiss,
        Stage::RayIntersection,
        Stage::RayCallable,
        Stage::MeshTask,
        Stage::Mesh,
    ];

    /// Resolve the effective stage.
    ///
    /// An explicit stage is returned unchanged. Otherwise the filename suffix
    /// is matched against `*.<keyword>` and `*.<keyword>.glsl`, and anything
    /// that doesn't match (including data without a filename) becomes
    /// `Vertex`. Never fails.
    pub fn resolve(explicit: Stage, filename: Option<&Path>) -> Stage {
        if explicit != Stage::Unspecified {
            return explicit;
        }

        if let Some(path) = filename {
            if let Some(stage) = Self::from_filename(path) {
                log::debug!("Detected {} stage from {}", stage, path.display());
                return stage;
            }
        }

        Stage::Vertex
    }

    /// Match a filename suffix against the stage keyword table.
    pub fn from_filename(path: &Path) -> Option<Stage> {
        let name = path.to_string_lossy();
        let name = name.strip_suffix(".glsl").unwrap_or(&name);

        STAGE_KEYWORDS.iter().find_map(|&(keyword, stage)| {
            name.strip_suffix(keyword)
                .filter(|rest| rest.ends_with('.'))
                .map(|_| stage)
        })
    }

    /// Lower-case stage name.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Unspecified => "unspecified",
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
            Stage::Geometry => "geometry",
            Stage::TessellationControl => "tessellation-control",
            Stage::TessellationEvaluation => "tessellation-evaluation",
            Stage::Compute => "compute",
            Stage::RayGeneration => "ray-generation",
            Stage::RayAnyHit => "ray-any-hit",
            Stage::RayClosestHit => "ray-closest-hit",
            Stage::RayMiss => "ray-miss",
            Stage::RayIntersection => "ray-intersection",
            Stage::RayCallable => "ray-callable",
            Stage::MeshTask => "mesh-task",
            Stage::Mesh => "mesh",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    /// Accepts stage names (`fragment`) as well as extension keywords (`frag`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Stage::Unspecified.name() {
            return Ok(Stage::Unspecified);
        }

        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.name() == s)
            .or_else(|| {
                STAGE_KEYWORDS
                    .iter()
                    .find(|(keyword, _)| *keyword == s)
                    .map(|&(_, stage)| stage)
            })
            .ok_or_else(|| ConfigError::UnknownStage(s.to_string()))
    }
}
