//! Parsed prediction previews returned by the compute service.
//!
//! The payload is GeoJSON-shaped but only the `prediction` property is ever
//! interpreted here; geometries stay opaque JSON for whatever draws the map.

use serde::Deserialize;

use crate::choropleth::{self, Rgb};

/// Property key carrying the predicted value for a feature.
pub const PREDICTION_KEY: &str = "prediction";

/// A feature collection of predicted parcels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionCollection {
    #[serde(default)]
    pub features: Vec<PredictionFeature>,
}

/// One parcel: opaque geometry plus a property bag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionFeature {
    /// Geometry as received; never inspected client-side.
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl PredictionFeature {
    /// The predicted value, if present and numeric.
    pub fn prediction(&self) -> Option<f64> {
        self.properties
            .get(PREDICTION_KEY)
            .and_then(serde_json::Value::as_f64)
            .filter(|value| value.is_finite())
    }
}

/// Extent of the numeric predictions in a collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl PredictionCollection {
    /// Parse a preview response body.
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Min/max across every numeric prediction, scanned once up front.
    ///
    /// `None` when no feature carries a usable value; callers treat that as
    /// "nothing to color" rather than an error.
    pub fn prediction_range(&self) -> Option<ValueRange> {
        let mut range: Option<ValueRange> = None;
        for value in self.features.iter().filter_map(PredictionFeature::prediction) {
            range = Some(match range {
                Some(current) => ValueRange {
                    min: current.min.min(value),
                    max: current.max.max(value),
                },
                None => ValueRange {
                    min: value,
                    max: value,
                },
            });
        }
        range
    }

    /// Fill color per feature, in feature order.
    ///
    /// Features without a usable prediction get the missing-value fill, and
    /// a collection with no usable predictions at all is uniformly missing.
    pub fn fill_colors(&self) -> Vec<Rgb> {
        let Some(range) = self.prediction_range() else {
            return vec![choropleth::MISSING_VALUE_COLOR; self.features.len()];
        };
        self.features
            .iter()
            .map(|feature| match feature.prediction() {
                Some(value) => choropleth::color(value, range.min, range.max),
                None => choropleth::MISSING_VALUE_COLOR,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choropleth::MISSING_VALUE_COLOR;

    fn collection(json: &str) -> PredictionCollection {
        PredictionCollection::parse(json.as_bytes()).unwrap()
    }

    #[test]
    fn parses_features_and_reads_predictions() {
        let parsed = collection(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature",
                     "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                     "properties": {"prediction": 420.5, "zone": "R1"}},
                    {"type": "Feature",
                     "geometry": null,
                     "properties": {"zone": "C2"}}
                ]
            }"#,
        );
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.features[0].prediction(), Some(420.5));
        assert_eq!(parsed.features[1].prediction(), None);
    }

    #[test]
    fn non_numeric_predictions_count_as_missing() {
        let parsed = collection(
            r#"{"features": [{"properties": {"prediction": "NaN"}}]}"#,
        );
        assert_eq!(parsed.features[0].prediction(), None);
        assert_eq!(parsed.prediction_range(), None);
    }

    #[test]
    fn range_spans_only_numeric_values() {
        let parsed = collection(
            r#"{"features": [
                {"properties": {"prediction": 120.0}},
                {"properties": {}},
                {"properties": {"prediction": 1380.0}},
                {"properties": {"prediction": "skip"}}
            ]}"#,
        );
        assert_eq!(
            parsed.prediction_range(),
            Some(ValueRange {
                min: 120.0,
                max: 1380.0
            })
        );
    }

    #[test]
    fn empty_collection_has_no_range_but_still_colors() {
        let parsed = collection(r#"{"features": []}"#);
        assert!(parsed.is_empty());
        assert_eq!(parsed.prediction_range(), None);
        assert!(parsed.fill_colors().is_empty());
    }

    #[test]
    fn fill_colors_track_feature_order() {
        let parsed = collection(
            r#"{"features": [
                {"properties": {"prediction": 0.0}},
                {"properties": {}},
                {"properties": {"prediction": 1000.0}}
            ]}"#,
        );
        let colors = parsed.fill_colors();
        assert_eq!(colors.len(), 3);
        assert_eq!(colors[0], crate::choropleth::color(0.0, 0.0, 1000.0));
        assert_eq!(colors[1], MISSING_VALUE_COLOR);
        assert_eq!(colors[2], crate::choropleth::color(1000.0, 0.0, 1000.0));
    }
}
