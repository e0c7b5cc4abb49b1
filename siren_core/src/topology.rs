//! GeoJSON features and the TopoJSON topology used by the geometry service.
//!
//! The geometry service answers with a topology: polygons share their boundaries as
//! `arcs` and every object refers to them by index. [`Topology::features`] expands it
//! back into standalone [`Feature`]s keyed by alert identifier.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::color::DEFAULT_COLOR;

/// A longitude/latitude pair.
pub type Position = [f64; 2];

/// The polygonal geometries an alert area can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// A single polygon: an outer ring followed by optional holes.
    Polygon {
        /// Rings of the polygon.
        coordinates: Vec<Vec<Position>>,
    },
    /// Several polygons.
    MultiPolygon {
        /// Polygons, each a list of rings.
        coordinates: Vec<Vec<Vec<Position>>>,
    },
}

/// A renderable feature, keyed in the geometry cache by `properties.id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    /// The boundary.
    pub geometry: Geometry,
    /// Identification and presentation attributes.
    pub properties: FeatureProperties,
}

/// Properties carried by every [`Feature`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureProperties {
    /// Identifier of the alert this feature belongs to.
    pub id: String,
    /// Event name shown next to the feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fill color, `#RRGGBB`.
    pub color: String,
}

/// Errors raised while expanding a topology.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TopologyError {
    /// An object referenced an arc the topology doesn't contain.
    #[error("arc index {index} out of range ({len} arcs)")]
    ArcOutOfRange {
        /// The offending index, as found in the object.
        index: i64,
        /// Number of arcs in the topology.
        len: usize,
    },
}

/// Quantization transform of a topology.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Multiplier applied to the quantized coordinates.
    pub scale: [f64; 2],
    /// Offset added after scaling.
    pub translate: [f64; 2],
}

/// Reference to an arc. Negative values (`!i`) walk arc `i` backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArcIndex(pub i64);

// Topologies that went through a JSON round trip encode arc indices as floats.
impl<'de> Deserialize<'de> for ArcIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ArcIndexVisitor;

        impl Visitor<'_> for ArcIndexVisitor {
            type Value = ArcIndex;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integral arc index")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ArcIndex, E> {
                Ok(ArcIndex(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ArcIndex, E> {
                i64::try_from(v)
                    .map(ArcIndex)
                    .map_err(|_| E::custom(format!("arc index {v} out of range")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<ArcIndex, E> {
                if v.is_finite() && v.fract() == 0.0 && v.abs() <= 9_007_199_254_740_992.0 {
                    Ok(ArcIndex(v as i64))
                } else {
                    Err(E::custom(format!("arc index {v} is not an integer")))
                }
            }
        }

        deserializer.deserialize_any(ArcIndexVisitor)
    }
}

/// An object of a topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TopoObject {
    /// A collection of nested objects.
    GeometryCollection {
        /// Nested objects.
        geometries: Vec<TopoObject>,
    },
    /// A polygon whose rings are sequences of arcs.
    Polygon {
        /// Arc indexes, one list per ring.
        arcs: Vec<Vec<ArcIndex>>,
        /// Object-level identifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<serde_json::Value>,
        /// Free-form properties; `id` and `color` are read.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<serde_json::Map<String, serde_json::Value>>,
    },
    /// Several polygons.
    MultiPolygon {
        /// Arc indexes, one list per ring, per polygon.
        arcs: Vec<Vec<Vec<ArcIndex>>>,
        /// Object-level identifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<serde_json::Value>,
        /// Free-form properties; `id` and `color` are read.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<serde_json::Map<String, serde_json::Value>>,
    },
    /// Points, lines and null geometries never describe an alert area.
    #[serde(other)]
    Unsupported,
}

/// A TopoJSON topology.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Topology")]
pub struct Topology {
    /// Present when the arcs are quantized and delta-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    /// Shared boundary segments.
    #[serde(default)]
    pub arcs: Vec<Vec<Position>>,
    /// Named top-level objects.
    #[serde(default)]
    pub objects: BTreeMap<String, TopoObject>,
}

impl Topology {
    /// Builds a topology holding one arc per ring of every feature.
    ///
    /// Boundaries are not shared between features; the result expands back to the same
    /// geometries.
    pub fn from_features<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Self {
        let mut arcs: Vec<Vec<Position>> = Vec::new();
        let mut geometries = Vec::new();

        let mut push_ring = |ring: &Vec<Position>| {
            arcs.push(ring.clone());
            vec![ArcIndex(arcs.len() as i64 - 1)]
        };

        for feature in features {
            let mut properties = serde_json::Map::new();
            properties.insert("id".into(), feature.properties.id.clone().into());
            properties.insert("color".into(), feature.properties.color.clone().into());
            let object = match &feature.geometry {
                Geometry::Polygon { coordinates } => TopoObject::Polygon {
                    arcs: coordinates.iter().map(&mut push_ring).collect(),
                    id: None,
                    properties: Some(properties),
                },
                Geometry::MultiPolygon { coordinates } => TopoObject::MultiPolygon {
                    arcs: coordinates
                        .iter()
                        .map(|polygon| polygon.iter().map(&mut push_ring).collect())
                        .collect(),
                    id: None,
                    properties: Some(properties),
                },
            };
            geometries.push(object);
        }

        let mut objects = BTreeMap::new();
        objects.insert(
            "alerts".to_string(),
            TopoObject::GeometryCollection { geometries },
        );
        Topology {
            transform: None,
            arcs,
            objects,
        }
    }

    /// Expands every polygonal object into a standalone feature.
    ///
    /// Objects without an identifier (neither `properties.id` nor `id`) can't be keyed
    /// and are skipped. The color defaults to [`DEFAULT_COLOR`] when the object doesn't
    /// carry one.
    pub fn features(&self) -> Result<Vec<Feature>, TopologyError> {
        let arcs = self.decoded_arcs();
        let mut features = Vec::new();
        for object in self.objects.values() {
            collect_features(&arcs, object, &mut features)?;
        }
        Ok(features)
    }

    /// Arcs in absolute coordinates.
    fn decoded_arcs(&self) -> Vec<Vec<Position>> {
        match self.transform {
            None => self.arcs.clone(),
            Some(Transform { scale, translate }) => self
                .arcs
                .iter()
                .map(|arc| {
                    let (mut x, mut y) = (0.0, 0.0);
                    arc.iter()
                        .map(|delta| {
                            x += delta[0];
                            y += delta[1];
                            [x * scale[0] + translate[0], y * scale[1] + translate[1]]
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

fn collect_features(
    arcs: &[Vec<Position>],
    object: &TopoObject,
    out: &mut Vec<Feature>,
) -> Result<(), TopologyError> {
    match object {
        TopoObject::GeometryCollection { geometries } => {
            for geometry in geometries {
                collect_features(arcs, geometry, out)?;
            }
        }
        TopoObject::Polygon {
            arcs: rings,
            id,
            properties,
        } => {
            let Some(properties) = feature_properties(id.as_ref(), properties.as_ref()) else {
                log::debug!("Skipping topology polygon without an identifier");
                return Ok(());
            };
            out.push(Feature {
                geometry: Geometry::Polygon {
                    coordinates: polygon(arcs, rings)?,
                },
                properties,
            });
        }
        TopoObject::MultiPolygon {
            arcs: polygons,
            id,
            properties,
        } => {
            let Some(properties) = feature_properties(id.as_ref(), properties.as_ref()) else {
                log::debug!("Skipping topology multipolygon without an identifier");
                return Ok(());
            };
            let coordinates = polygons
                .iter()
                .map(|rings| polygon(arcs, rings))
                .collect::<Result<_, _>>()?;
            out.push(Feature {
                geometry: Geometry::MultiPolygon { coordinates },
                properties,
            });
        }
        TopoObject::Unsupported => {}
    }
    Ok(())
}

fn feature_properties(
    id: Option<&serde_json::Value>,
    properties: Option<&serde_json::Map<String, serde_json::Value>>,
) -> Option<FeatureProperties> {
    let as_string = |value: &serde_json::Value| match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    let id = properties
        .and_then(|p| p.get("id"))
        .and_then(as_string)
        .or_else(|| id.and_then(as_string))?;
    let color = properties
        .and_then(|p| p.get("color"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COLOR)
        .to_string();
    Some(FeatureProperties {
        id,
        name: None,
        color,
    })
}

fn polygon(
    arcs: &[Vec<Position>],
    rings: &[Vec<ArcIndex>],
) -> Result<Vec<Vec<Position>>, TopologyError> {
    rings.iter().map(|ring_arcs| ring(arcs, ring_arcs)).collect()
}

/// Stitches arcs into a ring. Consecutive arcs share their joining point.
fn ring(arcs: &[Vec<Position>], indexes: &[ArcIndex]) -> Result<Vec<Position>, TopologyError> {
    let mut points: Vec<Position> = Vec::new();
    for &ArcIndex(index) in indexes {
        let (position, reversed) = if index < 0 {
            ((!index) as usize, true)
        } else {
            (index as usize, false)
        };
        let arc = arcs.get(position).ok_or(TopologyError::ArcOutOfRange {
            index,
            len: arcs.len(),
        })?;
        points.pop();
        if reversed {
            points.extend(arc.iter().rev().copied());
        } else {
            points.extend(arc.iter().copied());
        }
    }
    // Degenerate rings are padded so they stay closed.
    if !points.is_empty() && points.len() < 4 {
        points.push(points[0]);
    }
    Ok(points)
}
