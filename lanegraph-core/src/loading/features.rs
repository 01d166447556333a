//! GeoJSON feature collections: reading, `LineString` extraction and property
//! access.

use std::fs;
use std::path::Path;

use geo::{Coord, LineString};
use geojson::{Feature, FeatureCollection, Value as GeoJsonValue};
use serde_json::Value as JsonValue;

use crate::Error;
use crate::model::Node;

/// A `LineString` feature together with its points.
#[derive(Debug, Clone)]
pub struct Polyline<'a> {
    pub feature: &'a Feature,
    pub nodes: Vec<Node>,
}

/// Reads and parses a feature collection file.
///
/// # Errors
///
/// Returns [`Error::IngestionFailure`] if the file is missing, unreadable or
/// not a GeoJSON feature collection.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, Error> {
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::IngestionFailure(format!("Failed to read '{}': {e}", path.display())))?;
    serde_json::from_str(&contents).map_err(|e| {
        Error::IngestionFailure(format!(
            "'{}' is not a GeoJSON feature collection: {e}",
            path.display()
        ))
    })
}

/// `LineString` features of the collection, other geometries are ignored.
///
/// # Errors
///
/// Returns [`Error::IngestionFailure`] for a position that is not a finite
/// longitude/latitude pair.
pub fn polylines(features: &FeatureCollection) -> Result<Vec<Polyline<'_>>, Error> {
    let mut lines = Vec::new();
    for (idx, feature) in features.features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        if !matches!(geometry.value, GeoJsonValue::LineString { .. }) {
            continue;
        }
        let line = LineString::<f64>::try_from(geometry.value.clone())
            .map_err(|e| Error::IngestionFailure(format!("Feature {idx}: {e}")))?;
        let nodes = line
            .coords()
            .map(|&coord| coord_node(coord))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::IngestionFailure(format!("Feature {idx}: {e}")))?;
        lines.push(Polyline { feature, nodes });
    }
    Ok(lines)
}

fn coord_node(coord: Coord) -> Result<Node, String> {
    if coord.x.is_finite() && coord.y.is_finite() {
        Ok(Node::from(coord))
    } else {
        Err(format!("non-finite position ({}, {})", coord.x, coord.y))
    }
}

/// Scalar property rendered as a string, `None` when missing or null.
pub fn property_string(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        JsonValue::String(value) => Some(value.clone()),
        JsonValue::Number(value) => Some(value.to_string()),
        JsonValue::Bool(value) => Some(value.to_string()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Sidewalk tag of a walk feature; `"no"` counts as no sidewalk.
pub fn sidewalk_value(feature: &Feature, key: &str) -> Option<String> {
    property_string(feature, key).filter(|value| value != "no")
}
