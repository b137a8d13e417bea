//! Line-delimited feature codec.
//!
//! One feature per line, each line independently parseable. Standard
//! members (`id`, `ftype`, `type`, `geometry`, `properties`, `meta`) are
//! decoded into typed fields; every other top-level member is kept in
//! [`Feature::attributes`] so round-tripping a line never loses data.

use geo::Geometry;
use serde::Deserialize;
use serde_json::Value;

use crate::{Feature, FeatureError, FeatureType, JsonObject, Meta, SourceKind};

const RESERVED_MEMBERS: &[&str] = &["id", "ftype", "type", "geometry", "properties", "meta"];

/// The id and type of a line, readable without decoding the geometry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineHeader {
    /// Feature id.
    pub id: String,
    /// Feature type tag.
    pub ftype: FeatureType,
}

/// Reads only the `id` and `ftype` members of a line.
///
/// # Errors
///
/// Returns an error if the line is not a JSON object with both members.
pub fn read_header(line: &str) -> Result<LineHeader, FeatureError> {
    Ok(serde_json::from_str(line)?)
}

/// Converts a `geo` geometry to its `GeoJSON` object form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn geometry_to_json(geometry: &Geometry<f64>) -> Result<Value, FeatureError> {
    let geometry = geojson::Geometry::new(geojson::Value::from(geometry));
    Ok(serde_json::to_value(&geometry)?)
}

/// Converts a `GeoJSON` geometry object to a `geo` geometry.
///
/// # Errors
///
/// Returns an error if the value is not a valid `GeoJSON` geometry.
pub fn geometry_from_json(value: Value) -> Result<Geometry<f64>, FeatureError> {
    let geometry: geojson::Geometry = serde_json::from_value(value)?;
    Geometry::<f64>::try_from(geometry).map_err(|e| FeatureError::GeoJson(Box::new(e)))
}

impl Feature {
    /// Serializes the feature to a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if a geometry cannot be serialized.
    pub fn to_json(&self) -> Result<Value, FeatureError> {
        let mut object = JsonObject::new();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        object.insert("ftype".to_string(), serde_json::to_value(self.ftype)?);
        object.insert("type".to_string(), Value::String("Feature".to_string()));
        object.insert("geometry".to_string(), geometry_to_json(&self.geometry)?);
        object.insert(
            "properties".to_string(),
            Value::Object(self.properties.clone()),
        );
        object.insert("meta".to_string(), meta_to_json(&self.meta)?);

        for (key, value) in self.attributes.iter().chain(self.enrichment.iter()) {
            object.insert(key.clone(), value.clone());
        }

        Ok(Value::Object(object))
    }

    /// Serializes the feature to a single line (no trailing newline).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_line(&self) -> Result<String, FeatureError> {
        Ok(serde_json::to_string(&self.to_json()?)?)
    }

    /// Parses a feature from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if a mandatory member is missing or malformed.
    pub fn from_json(value: Value) -> Result<Self, FeatureError> {
        let Value::Object(mut object) = value else {
            return Err(FeatureError::InvalidField {
                field: "feature",
                message: "not a JSON object".to_string(),
            });
        };

        let id = match object.remove("id") {
            Some(Value::String(id)) => id,
            Some(other) => other.to_string(),
            None => return Err(FeatureError::MissingField("id")),
        };
        let ftype: FeatureType = serde_json::from_value(
            object
                .remove("ftype")
                .ok_or(FeatureError::MissingField("ftype"))?,
        )?;
        let geometry = geometry_from_json(
            object
                .remove("geometry")
                .ok_or(FeatureError::MissingField("geometry"))?,
        )?;
        let properties = match object.remove("properties") {
            Some(Value::Object(properties)) => properties,
            Some(Value::Null) | None => JsonObject::new(),
            Some(_) => {
                return Err(FeatureError::InvalidField {
                    field: "properties",
                    message: "expected an object".to_string(),
                });
            }
        };
        let meta = meta_from_json(object.remove("meta").ok_or(FeatureError::MissingField("meta"))?)?;

        object.retain(|key, _| !RESERVED_MEMBERS.contains(&key.as_str()));

        Ok(Self {
            id,
            ftype,
            geometry,
            properties,
            meta,
            attributes: object,
            enrichment: JsonObject::new(),
        })
    }

    /// Parses a feature from one line of the exchange format.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a valid feature.
    pub fn from_line(line: &str) -> Result<Self, FeatureError> {
        Self::from_json(serde_json::from_str(line)?)
    }
}

fn meta_to_json(meta: &Meta) -> Result<Value, FeatureError> {
    let mut object = JsonObject::new();
    object.insert("id".to_string(), Value::from(meta.id));
    object.insert("type".to_string(), serde_json::to_value(meta.kind)?);
    if let Some(full) = &meta.full_geometry {
        object.insert("fullGeometry".to_string(), geometry_to_json(full)?);
    }
    for (key, value) in &meta.extra {
        object.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(object))
}

fn meta_from_json(value: Value) -> Result<Meta, FeatureError> {
    let Value::Object(mut object) = value else {
        return Err(FeatureError::InvalidField {
            field: "meta",
            message: "expected an object".to_string(),
        });
    };

    let id = object
        .remove("id")
        .and_then(|v| v.as_i64())
        .ok_or(FeatureError::MissingField("meta.id"))?;
    let kind: SourceKind = serde_json::from_value(
        object
            .remove("type")
            .ok_or(FeatureError::MissingField("meta.type"))?,
    )?;
    let full_geometry = match object.remove("fullGeometry") {
        Some(Value::Null) | None => None,
        Some(value) => Some(geometry_from_json(value)?),
    };

    Ok(Meta {
        id,
        kind,
        full_geometry,
        extra: object,
    })
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Point, Polygon};

    use super::*;
    use crate::properties_from_tags;

    fn square() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]),
            vec![],
        )
    }

    #[test]
    fn round_trips_point_feature_with_attributes() {
        let mut feature = Feature::new(
            "poipnt-00ff-7".to_string(),
            FeatureType::Poi,
            Geometry::Point(Point::new(13.4, 52.5)),
            properties_from_tags([("amenity", "cafe"), ("name", "Kaffee")]),
            Meta::new(7, SourceKind::Way).with_full_geometry(Geometry::Polygon(square())),
        );
        feature
            .attributes
            .insert("poiTypes".to_string(), serde_json::json!(["amenity:cafe"]));

        let line = feature.to_line().unwrap();
        let parsed = Feature::from_line(&line).unwrap();

        assert_eq!(parsed, feature);
        assert!(parsed.full_polygon().is_some());
    }

    #[test]
    fn enrichment_is_written_at_top_level() {
        let mut feature = Feature::new(
            "adrpnt-01-3".to_string(),
            FeatureType::AddressPoint,
            Geometry::Point(Point::new(0.5, 0.5)),
            JsonObject::new(),
            Meta::new(3, SourceKind::Node),
        );
        feature
            .enrichment
            .insert("boundaries".to_string(), serde_json::json!([]));

        let value = feature.to_json().unwrap();
        assert!(value["boundaries"].is_array());
        assert_eq!(value["meta"]["type"], "node");
        assert_eq!(value["type"], "Feature");
    }

    #[test]
    fn header_reads_id_and_ftype_only() {
        let header =
            read_header(r#"{"id":"hghway-1-2","ftype":"hghway","geometry":null}"#).unwrap();
        assert_eq!(header.id, "hghway-1-2");
        assert_eq!(header.ftype, FeatureType::Street);
    }

    #[test]
    fn missing_meta_is_an_error() {
        let err = Feature::from_line(
            r#"{"id":"a-b-1","ftype":"adrpnt","geometry":{"type":"Point","coordinates":[0,0]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FeatureError::MissingField("meta")));
    }
}
