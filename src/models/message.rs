use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use serde_json::Value;

use crate::models::alert::{AlertSource, Coordinates, NewAlert};

/// Accident detection published by the camera-side detector.
#[derive(Debug, Deserialize)]
pub struct DetectionMessage {
    pub alert_id: Option<String>,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub coordinates_lat: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub coordinates_lng: Option<f64>,
    pub time: Option<String>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub confidence_score: Option<f64>,
    pub accident_clip: Option<String>,
    pub video_url: Option<String>,
    #[serde(flatten)]
    pub other: HashMap<String, Value>,
}

impl DetectionMessage {
    pub fn coordinates(&self) -> Option<Coordinates> {
        let coordinates = Coordinates {
            lat: self.coordinates_lat?,
            lng: self.coordinates_lng?,
        };
        coordinates.is_finite().then_some(coordinates)
    }

    /// None when the detection carries no usable position.
    pub fn into_new_alert(self) -> Option<NewAlert> {
        let coordinates = self.coordinates()?;
        let location = self
            .location
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "Emergency Location".to_string());
        Some(NewAlert {
            id: self.alert_id.filter(|id| !id.trim().is_empty()),
            location,
            coordinates,
            time: self.time,
            date: self.date,
            accident_clip: self.accident_clip.or(self.video_url),
            confidence_score: self.confidence_score,
            source: AlertSource::Detection,
        })
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}
