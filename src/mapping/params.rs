//! Module mapping parameters.
//!
//! Describes how the modules of a display are wired: whether the data line
//! runs along rows or columns, which corner it starts in, whether it snakes
//! back on alternating lines, and an optional final mirror.

use crate::pipeline::config_value::RawConfig;
use crate::pipeline::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw config keys holding the mapping parameters of an output node.
pub const MAP_TYPE_KEY: &str = "mapType";
pub const MAP_ORIENTATION_KEY: &str = "mapOrientation";
pub const MAP_START_KEY: &str = "mapStart";
pub const MAP_FLIP_KEY: &str = "mapFlip";

/// Traversal pattern along the primary axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapType {
    /// Every line runs in the same direction.
    #[default]
    Line,
    /// Direction reverses on every other line.
    #[serde(alias = "snake", alias = "zigzag")]
    Serpentine,
}

/// Primary axis of the wiring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapOrientation {
    /// Lines are rows.
    #[default]
    #[serde(alias = "horz")]
    Horizontal,
    /// Lines are columns.
    #[serde(alias = "vert")]
    Vertical,
}

/// Corner holding the first physical module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapStart {
    #[default]
    #[serde(alias = "tl")]
    TopLeft,
    #[serde(alias = "tr")]
    TopRight,
    #[serde(alias = "bl")]
    BottomLeft,
    #[serde(alias = "br")]
    BottomRight,
}

impl MapStart {
    #[inline]
    pub fn from_right(self) -> bool {
        matches!(self, MapStart::TopRight | MapStart::BottomRight)
    }

    #[inline]
    pub fn from_bottom(self) -> bool {
        matches!(self, MapStart::BottomLeft | MapStart::BottomRight)
    }
}

/// Final mirror applied after traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapFlip {
    #[default]
    None,
    /// Mirror x.
    #[serde(alias = "h", alias = "horz")]
    Horizontal,
    /// Mirror y.
    #[serde(alias = "v", alias = "vert")]
    Vertical,
    Both,
}

impl MapFlip {
    #[inline]
    pub fn mirrors_x(self) -> bool {
        matches!(self, MapFlip::Horizontal | MapFlip::Both)
    }

    #[inline]
    pub fn mirrors_y(self) -> bool {
        matches!(self, MapFlip::Vertical | MapFlip::Both)
    }
}

macro_rules! impl_parse {
    ($ty:ty, $what:literal, { $($($name:literal)|+ => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = PipelineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($($name)|+ => Ok($variant),)+
                    other => Err(PipelineError::InvalidMapping(format!(
                        "unknown {} '{}'",
                        $what, other
                    ))),
                }
            }
        }
    };
}

impl_parse!(MapType, "map type", {
    "line" => MapType::Line,
    "serpentine" | "snake" | "zigzag" => MapType::Serpentine,
});

impl_parse!(MapOrientation, "map orientation", {
    "horizontal" | "horz" | "h" => MapOrientation::Horizontal,
    "vertical" | "vert" | "v" => MapOrientation::Vertical,
});

impl_parse!(MapStart, "map start corner", {
    "top-left" | "topleft" | "tl" => MapStart::TopLeft,
    "top-right" | "topright" | "tr" => MapStart::TopRight,
    "bottom-left" | "bottomleft" | "bl" => MapStart::BottomLeft,
    "bottom-right" | "bottomright" | "br" => MapStart::BottomRight,
});

impl_parse!(MapFlip, "map flip", {
    "none" | "" => MapFlip::None,
    "horizontal" | "horz" | "h" => MapFlip::Horizontal,
    "vertical" | "vert" | "v" => MapFlip::Vertical,
    "both" | "hv" => MapFlip::Both,
});

/// Full wiring description. `Default` is the identity wiring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MappingParams {
    pub map_type: MapType,
    pub map_orientation: MapOrientation,
    pub map_start: MapStart,
    pub map_flip: MapFlip,
}

impl MappingParams {
    /// Row-major from the top-left corner with no mirroring.
    pub const IDENTITY: MappingParams = MappingParams {
        map_type: MapType::Line,
        map_orientation: MapOrientation::Horizontal,
        map_start: MapStart::TopLeft,
        map_flip: MapFlip::None,
    };

    pub fn new(
        map_type: MapType,
        map_orientation: MapOrientation,
        map_start: MapStart,
        map_flip: MapFlip,
    ) -> Self {
        Self {
            map_type,
            map_orientation,
            map_start,
            map_flip,
        }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Reads the mapping keys of a node config. Absent keys take the identity
    /// component; unknown values fail with `InvalidMapping`.
    pub fn from_raw(config: &RawConfig) -> PipelineResult<Self> {
        fn field<T: FromStr<Err = PipelineError> + Default>(
            config: &RawConfig,
            key: &str,
        ) -> PipelineResult<T> {
            match config.get(key) {
                None => Ok(T::default()),
                Some(value) => match value.as_str() {
                    Some(s) => s.parse(),
                    None => Err(PipelineError::InvalidMapping(format!(
                        "'{}' must be a string, got {:?}",
                        key, value
                    ))),
                },
            }
        }

        Ok(Self {
            map_type: field(config, MAP_TYPE_KEY)?,
            map_orientation: field(config, MAP_ORIENTATION_KEY)?,
            map_start: field(config, MAP_START_KEY)?,
            map_flip: field(config, MAP_FLIP_KEY)?,
        })
    }

    /// All 64 parameter combinations, handy for exhaustive checks.
    pub fn all() -> impl Iterator<Item = MappingParams> {
        const TYPES: [MapType; 2] = [MapType::Line, MapType::Serpentine];
        const ORIENTATIONS: [MapOrientation; 2] =
            [MapOrientation::Horizontal, MapOrientation::Vertical];
        const STARTS: [MapStart; 4] = [
            MapStart::TopLeft,
            MapStart::TopRight,
            MapStart::BottomLeft,
            MapStart::BottomRight,
        ];
        const FLIPS: [MapFlip; 4] = [
            MapFlip::None,
            MapFlip::Horizontal,
            MapFlip::Vertical,
            MapFlip::Both,
        ];

        TYPES.into_iter().flat_map(|t| {
            ORIENTATIONS.into_iter().flat_map(move |o| {
                STARTS.into_iter().flat_map(move |s| {
                    FLIPS
                        .into_iter()
                        .map(move |f| MappingParams::new(t, o, s, f))
                })
            })
        })
    }
}

impl fmt::Display for MappingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}/flip {:?}",
            self.map_type, self.map_orientation, self.map_start, self.map_flip
        )
    }
}
