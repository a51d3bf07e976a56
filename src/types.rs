use serde::Serialize;

/// Crop recommendation classes, indexed by model output position.
pub const CROP_LABELS: [&str; 22] = [
    "apple", "banana", "blackgram", "chickpea", "coconut", "coffee",
    "cotton", "grapes", "jute", "kidneybeans", "lentil", "maize",
    "mango", "mothbeans", "mungbean", "muskmelon", "orange", "papaya",
    "pigeonpeas", "pomegranate", "rice", "watermelon",
];

/// Soil fertility classes, indexed by model output position.
pub const SOIL_CLASSES: [&str; 3] = ["Low", "Mild", "High"];

const CROP_FIELDS: [&str; 7] = ["N", "P", "K", "temperature", "humidity", "ph", "rainfall"];
const SOIL_FIELDS: [&str; 4] = ["N", "P", "K", "pH"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Crop,
    Soil,
}

impl ModelKind {
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Crop => "crop",
            ModelKind::Soil => "soil",
        }
    }

    /// Input order the model was trained with.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            ModelKind::Crop => &CROP_FIELDS,
            ModelKind::Soil => &SOIL_FIELDS,
        }
    }

    pub fn labels(self) -> &'static [&'static str] {
        match self {
            ModelKind::Crop => &CROP_LABELS,
            ModelKind::Soil => &SOIL_CLASSES,
        }
    }

    pub fn in_dim(self) -> usize {
        self.fields().len()
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered model input. Built only by the reconciler, so the width always
/// matches `kind.fields()`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    kind: ModelKind,
    values: Vec<f32>,
}

impl FeatureVector {
    pub(crate) fn new(kind: ModelKind, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), kind.in_dim());
        Self { kind, values }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label: &'static str,
    pub confidence: f32,
    pub class_index: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct CropPrediction {
    pub predicted_crop: &'static str,
    pub confidence: f32,
    pub class_index: usize,
}

impl From<PredictionResult> for CropPrediction {
    fn from(r: PredictionResult) -> Self {
        Self {
            predicted_crop: r.label,
            confidence: r.confidence,
            class_index: r.class_index,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct SoilPrediction {
    pub predicted_fertility: &'static str,
    pub confidence: f32,
    pub class_index: usize,
}

impl From<PredictionResult> for SoilPrediction {
    fn from(r: PredictionResult) -> Self {
        Self {
            predicted_fertility: r.label,
            confidence: r.confidence,
            class_index: r.class_index,
        }
    }
}

/// Values actually fed to both models for a sensor request.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct SensorReading {
    #[serde(rename = "N")]
    pub n: f32,
    #[serde(rename = "P")]
    pub p: f32,
    #[serde(rename = "K")]
    pub k: f32,
    #[serde(rename = "pH")]
    pub ph_soil: f32,
    #[serde(rename = "ph")]
    pub ph_crop: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub rainfall: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_tables_match_model_widths() {
        assert_eq!(ModelKind::Crop.labels().len(), 22);
        assert_eq!(ModelKind::Soil.labels()[2], "High");
        assert_eq!(ModelKind::Crop.in_dim(), 7);
        assert_eq!(ModelKind::Soil.in_dim(), 4);
    }

    #[test]
    fn sensor_reading_serializes_both_ph_keys() {
        let r = SensorReading {
            n: 90.0,
            p: 42.0,
            k: 43.0,
            ph_soil: 6.5,
            ph_crop: 6.5,
            temperature: 25.0,
            humidity: 60.0,
            rainfall: 100.0,
        };
        let v = serde_json::to_value(r).unwrap();
        assert_eq!(v["pH"], v["ph"]);
        assert_eq!(v["N"], 90.0);
    }
}
