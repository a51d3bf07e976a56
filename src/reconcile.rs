//! Maps client payloads onto the fixed-order feature vectors each model was
//! trained with.
//!
//! Three payload shapes arrive here: the per-model web forms, the combined
//! form that feeds both models, and raw sensor telemetry. Field order always
//! comes from [`ModelKind::fields`], never from the order keys appear in.

use serde_json::{Map, Value};

use crate::types::{FeatureVector, ModelKind, SensorReading};

pub type Payload = Map<String, Value>;

/// Upper bound of the pH scale. Sensor readings above it are taken to be
/// fixed-point encoded (x10).
pub const PH_SCALE_MAX: f32 = 14.0;

pub const DEFAULT_SOIL_PH: f32 = 6.5;
pub const DEFAULT_TEMPERATURE: f32 = 25.0;
pub const DEFAULT_HUMIDITY: f32 = 60.0;
pub const DEFAULT_RAINFALL: f32 = 100.0;
pub const DEFAULT_NUTRIENT: f32 = 0.0;

/// Every field that kept a payload from validating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub missing: Vec<String>,
    pub invalid: Vec<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    fn push_missing(&mut self, field: &str) {
        if !self.missing.iter().any(|f| f == field) {
            self.missing.push(field.to_string());
        }
    }

    fn push_invalid(&mut self, field: &str) {
        if !self.invalid.iter().any(|f| f == field) {
            self.invalid.push(field.to_string());
        }
    }

    fn merge(&mut self, other: FieldErrors) {
        for f in &other.missing {
            self.push_missing(f);
        }
        for f in &other.invalid {
            self.push_invalid(f);
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("Missing required fields: [{}]", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("Invalid numeric fields: [{}]", self.invalid.join(", ")));
        }
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

enum Lookup {
    Absent,
    Invalid,
    Number(f32),
}

// Numbers and numeric strings are accepted; null counts as absent.
fn lookup(payload: &Payload, key: &str) -> Lookup {
    match payload.get(key) {
        None | Some(Value::Null) => Lookup::Absent,
        // values past f32 range would reach the model as inf
        Some(Value::Number(n)) => match n.as_f64().map(|x| x as f32) {
            Some(x) if x.is_finite() => Lookup::Number(x),
            _ => Lookup::Invalid,
        },
        Some(Value::String(s)) => match s.trim().parse::<f32>() {
            Ok(x) if x.is_finite() => Lookup::Number(x),
            _ => Lookup::Invalid,
        },
        Some(_) => Lookup::Invalid,
    }
}

fn required(payload: &Payload, kind: ModelKind) -> Result<FeatureVector, FieldErrors> {
    let mut errors = FieldErrors::default();
    let mut values = Vec::with_capacity(kind.in_dim());
    for field in kind.fields() {
        match lookup(payload, field) {
            Lookup::Number(x) => values.push(x),
            Lookup::Absent => errors.push_missing(field),
            Lookup::Invalid => errors.push_invalid(field),
        }
    }
    if errors.is_empty() {
        Ok(FeatureVector::new(kind, values))
    } else {
        Err(errors)
    }
}

/// `[N, P, K, temperature, humidity, ph, rainfall]`
pub fn crop_features(payload: &Payload) -> Result<FeatureVector, FieldErrors> {
    required(payload, ModelKind::Crop)
}

/// `[N, P, K, pH]`
pub fn soil_features(payload: &Payload) -> Result<FeatureVector, FieldErrors> {
    required(payload, ModelKind::Soil)
}

/// The crop model reads `ph` and the soil model reads `pH`. When a client
/// sends only one of them, copy it into the other.
pub fn reconcile_ph(payload: &mut Payload) {
    let has = |p: &Payload, k: &str| !matches!(p.get(k), None | Some(Value::Null));
    match (has(payload, "ph"), has(payload, "pH")) {
        (true, false) => {
            let v = payload["ph"].clone();
            payload.insert("pH".to_string(), v);
        }
        (false, true) => {
            let v = payload["pH"].clone();
            payload.insert("ph".to_string(), v);
        }
        _ => {}
    }
}

/// Reconciles pH keys in place, then validates both field sets. On failure
/// the error names every field either model is missing.
pub fn combined_features(
    payload: &mut Payload,
) -> Result<(FeatureVector, FeatureVector), FieldErrors> {
    reconcile_ph(payload);
    match (crop_features(payload), soil_features(payload)) {
        (Ok(crop), Ok(soil)) => Ok((crop, soil)),
        (crop, soil) => {
            let mut errors = FieldErrors::default();
            if let Err(e) = crop {
                errors.merge(e);
            }
            if let Err(e) = soil {
                errors.merge(e);
            }
            Err(errors)
        }
    }
}

/// Telemetry as posted by the field sensor board. Every field is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorPayload {
    pub nitrogen: Option<f32>,
    pub phosphorus: Option<f32>,
    pub potassium: Option<f32>,
    pub soil_ph: Option<f32>,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub rainfall: Option<f32>,
}

impl SensorPayload {
    pub fn from_payload(payload: &Payload) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::default();
        let mut take = |key: &str| match lookup(payload, key) {
            Lookup::Number(x) => Some(x),
            Lookup::Absent => None,
            Lookup::Invalid => {
                errors.push_invalid(key);
                None
            }
        };
        let parsed = Self {
            nitrogen: take("nitrogen"),
            phosphorus: take("phosphorus"),
            potassium: take("potassium"),
            soil_ph: take("soilPH"),
            temperature: take("temperature"),
            humidity: take("humidity"),
            rainfall: take("rainfall"),
        };
        if errors.is_empty() {
            Ok(parsed)
        } else {
            Err(errors)
        }
    }

    /// Applies defaults and pH rescaling.
    pub fn reading(&self) -> SensorReading {
        let ph = normalize_sensor_ph(self.soil_ph.unwrap_or(DEFAULT_SOIL_PH));
        SensorReading {
            n: self.nitrogen.unwrap_or(DEFAULT_NUTRIENT),
            p: self.phosphorus.unwrap_or(DEFAULT_NUTRIENT),
            k: self.potassium.unwrap_or(DEFAULT_NUTRIENT),
            ph_soil: ph,
            ph_crop: ph,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            humidity: self.humidity.unwrap_or(DEFAULT_HUMIDITY),
            rainfall: self.rainfall.unwrap_or(DEFAULT_RAINFALL),
        }
    }
}

/// Heuristic only: a reading above the top of the pH scale is assumed to be
/// scaled by exactly 10 (`65` means `6.5`). No other unit is recognised.
pub fn normalize_sensor_ph(raw: f32) -> f32 {
    if raw > PH_SCALE_MAX {
        raw / 10.0
    } else {
        raw
    }
}

/// Crop and soil vectors for a normalized sensor reading.
pub fn sensor_features(r: &SensorReading) -> (FeatureVector, FeatureVector) {
    let crop = FeatureVector::new(
        ModelKind::Crop,
        vec![r.n, r.p, r.k, r.temperature, r.humidity, r.ph_crop, r.rainfall],
    );
    let soil = FeatureVector::new(ModelKind::Soil, vec![r.n, r.p, r.k, r.ph_soil]);
    (crop, soil)
}
