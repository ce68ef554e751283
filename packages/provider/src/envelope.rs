//! `GeoJSON` envelope validation and per-source filtering.
//!
//! A response body must be a JSON object with a `type` member and an array
//! `features` member. Individual features that are malformed, have no
//! geometry, or fall outside the source's geometry allow-list are dropped
//! with a warning; they never fail the load.

use impact_map_layer_models::{DataSource, Feature, FeatureCollection};

use crate::ProviderError;

/// Parses and validates a response body for `source`.
///
/// # Errors
///
/// Returns [`ProviderError::Json`] if the body is not JSON and
/// [`ProviderError::InvalidEnvelope`] if it lacks `type` or an array
/// `features`.
pub fn parse_collection(source: DataSource, body: &str) -> Result<FeatureCollection, ProviderError> {
    let json: serde_json::Value = serde_json::from_str(body)?;
    collection_from_value(source, json)
}

/// Validates an already-parsed JSON value as a feature collection.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidEnvelope`] if the value lacks `type` or
/// an array `features`.
pub fn collection_from_value(
    source: DataSource,
    json: serde_json::Value,
) -> Result<FeatureCollection, ProviderError> {
    if json.get("type").is_none_or(serde_json::Value::is_null) {
        return Err(ProviderError::InvalidEnvelope {
            layer: source,
            reason: "missing `type`".to_string(),
        });
    }

    let serde_json::Value::Object(mut object) = json else {
        return Err(ProviderError::InvalidEnvelope {
            layer: source,
            reason: "body is not an object".to_string(),
        });
    };

    let Some(serde_json::Value::Array(raw_features)) = object.remove("features") else {
        return Err(ProviderError::InvalidEnvelope {
            layer: source,
            reason: "`features` is not an array".to_string(),
        });
    };

    let total = raw_features.len();
    let features: Vec<Feature> = raw_features
        .into_iter()
        .enumerate()
        .filter_map(|(i, raw)| convert_feature(source, i, raw))
        .collect();

    if features.len() < total {
        log::warn!(
            "{source}: dropped {} of {total} features without usable geometry",
            total - features.len()
        );
    }

    Ok(filter_allowed(FeatureCollection::new(source, features)))
}

/// Drops features whose geometry family is not allowed for the
/// collection's source.
#[must_use]
pub fn filter_allowed(collection: FeatureCollection) -> FeatureCollection {
    let source = collection.source();
    let Some(allowed) = source.allowed_families() else {
        return collection;
    };

    let (kept, dropped) = collection.retain_families(allowed);
    if dropped > 0 {
        log::warn!("{source}: discarded {dropped} features with disallowed geometry types");
    }
    log::debug!("{source}: {} features accepted", kept.len());

    kept
}

fn convert_feature(source: DataSource, index: usize, raw: serde_json::Value) -> Option<Feature> {
    let feature: geojson::Feature = match serde_json::from_value(raw) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("{source}: feature {index} is not valid GeoJSON: {e}");
            return None;
        }
    };

    match Feature::from_geojson(feature) {
        Ok(f) => Some(f),
        Err(e) => {
            log::debug!("{source}: feature {index} skipped: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impact_map_layer_models::GeometryFamily;

    const MIXED_BOUNDARIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "Dhulikhel" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[85.5, 27.6], [85.6, 27.6], [85.6, 27.7], [85.5, 27.6]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "stray point" },
                "geometry": { "type": "Point", "coordinates": [85.5, 27.6] }
            },
            {
                "type": "Feature",
                "properties": { "name": "no geometry" },
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn boundaries_keep_only_polygons() {
        let collection = parse_collection(DataSource::Local, MIXED_BOUNDARIES).unwrap();

        assert_eq!(collection.len(), 1);
        assert_eq!(collection.features()[0].family(), GeometryFamily::Area);
        assert_eq!(
            collection.features()[0].property("name").as_deref(),
            Some("Dhulikhel")
        );
    }

    #[test]
    fn hospitals_keep_any_family_with_geometry() {
        let collection = parse_collection(DataSource::Hospitals, MIXED_BOUNDARIES).unwrap();
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn missing_type_is_invalid() {
        let err = parse_collection(DataSource::Roads, r#"{ "features": [] }"#).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidEnvelope {
                layer: DataSource::Roads,
                ..
            }
        ));
    }

    #[test]
    fn non_array_features_is_invalid() {
        let err = parse_collection(
            DataSource::Buildings,
            r#"{ "type": "FeatureCollection", "features": {} }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidEnvelope { .. }));
    }

    #[test]
    fn non_json_body_is_a_json_error() {
        assert!(matches!(
            parse_collection(DataSource::Province, "<html>502</html>"),
            Err(ProviderError::Json(_))
        ));
    }

    #[test]
    fn empty_collection_is_valid() {
        let collection = parse_collection(
            DataSource::District,
            r#"{ "type": "FeatureCollection", "features": [] }"#,
        )
        .unwrap();
        assert!(collection.is_empty());
    }
}
