//! Scaling, inference and label assembly for the crop and soil models.

use anyhow::{ensure, Result};

use crate::{
    config::Config,
    error::ApiError,
    model::{Classifier, Scaler, TorchClassifier},
    types::{FeatureVector, ModelKind, PredictionResult},
};

/// A loaded model together with the scaler it was trained behind.
pub struct ModelHandle {
    scaler: Scaler,
    classifier: Box<dyn Classifier>,
}

impl ModelHandle {
    pub fn new(kind: ModelKind, scaler: Scaler, classifier: Box<dyn Classifier>) -> Result<Self> {
        ensure!(
            scaler.width() == kind.in_dim(),
            "{} scaler expects {} features, model takes {}",
            kind,
            scaler.width(),
            kind.in_dim()
        );
        Ok(Self { scaler, classifier })
    }

    fn load(kind: ModelKind, config: &Config) -> Result<Self> {
        let scaler = Scaler::load(config.scaler_path(kind))?;
        let classifier =
            TorchClassifier::load(config.model_path(kind), kind.in_dim(), kind.labels().len())?;
        Self::new(kind, scaler, Box::new(classifier))
    }
}

/// Built once at startup and shared read-only by every request.
#[derive(Default)]
pub struct InferenceContext {
    crop: Option<ModelHandle>,
    soil: Option<ModelHandle>,
    log_features: bool,
}

impl InferenceContext {
    pub fn new(crop: Option<ModelHandle>, soil: Option<ModelHandle>) -> Self {
        Self {
            crop,
            soil,
            log_features: false,
        }
    }

    /// Loads both models and scalers. A model that fails to load is logged
    /// and left out; requests that need it fail individually.
    pub fn load(config: &Config) -> Self {
        let load_one = |kind: ModelKind| match ModelHandle::load(kind, config) {
            Ok(handle) => {
                tracing::info!(
                    model = %kind,
                    path = %config.model_path(kind).display(),
                    scaler = %config.scaler_path(kind).display(),
                    "model and scaler loaded"
                );
                Some(handle)
            }
            Err(e) => {
                tracing::error!(model = %kind, error = %format!("{e:#}"), "failed to load model");
                None
            }
        };
        Self {
            crop: load_one(ModelKind::Crop),
            soil: load_one(ModelKind::Soil),
            log_features: config.log_features,
        }
    }

    pub fn with_feature_logging(mut self, enabled: bool) -> Self {
        self.log_features = enabled;
        self
    }

    pub fn is_loaded(&self, kind: ModelKind) -> bool {
        self.handle(kind).is_some()
    }

    /// Both models available.
    pub fn is_ready(&self) -> bool {
        self.crop.is_some() && self.soil.is_some()
    }

    fn handle(&self, kind: ModelKind) -> Option<&ModelHandle> {
        match kind {
            ModelKind::Crop => self.crop.as_ref(),
            ModelKind::Soil => self.soil.as_ref(),
        }
    }

    /// Scale, classify, and map the winning class to its label.
    pub fn predict(&self, features: &FeatureVector) -> Result<PredictionResult, ApiError> {
        let kind = features.kind();
        let handle = self
            .handle(kind)
            .ok_or_else(|| ApiError::InferenceFailure(format!("{kind} model not loaded")))?;

        if self.log_features {
            log_feature_stats(features);
        }

        let scaled = handle
            .scaler
            .transform(features.as_slice())
            .map_err(|e| ApiError::InferenceFailure(format!("{e:#}")))?;
        let dist = handle
            .classifier
            .predict(&scaled)
            .map_err(|e| ApiError::InferenceFailure(format!("{e:#}")))?;

        if dist.iter().any(|p| p.is_nan()) {
            return Err(ApiError::InferenceFailure(format!(
                "{kind} model returned NaN scores"
            )));
        }
        let (class_index, confidence) = argmax(&dist).ok_or_else(|| {
            ApiError::InferenceFailure(format!("{kind} model returned an empty distribution"))
        })?;
        tracing::debug!(model = %kind, class_index, confidence, "inference complete");
        assemble(kind, class_index, confidence)
    }
}

/// Index and value of the highest score; the first one wins ties. Callers
/// reject NaN scores before this.
pub fn argmax(dist: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in dist.iter().enumerate() {
        match best {
            Some((_, b)) if p <= b => {}
            _ => best = Some((i, p)),
        }
    }
    best
}

/// Maps a class index onto the model's label table. Out of range is an
/// error, never a fallback label.
pub fn assemble(
    kind: ModelKind,
    class_index: usize,
    confidence: f32,
) -> Result<PredictionResult, ApiError> {
    let labels = kind.labels();
    let label = labels
        .get(class_index)
        .copied()
        .ok_or(ApiError::ClassOutOfRange {
            model: kind,
            index: class_index,
            len: labels.len(),
        })?;
    Ok(PredictionResult {
        label,
        confidence,
        class_index,
    })
}

fn log_feature_stats(features: &FeatureVector) {
    let vec = features.as_slice();
    let nz = vec.iter().filter(|x| **x != 0.0).count();
    let mean = if vec.is_empty() { 0.0 } else { vec.iter().sum::<f32>() / (vec.len() as f32) };
    let std = if vec.len() < 2 {
        0.0
    } else {
        (vec.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / (vec.len() as f32)).sqrt()
    };
    let sample: Vec<String> = features
        .kind()
        .fields()
        .iter()
        .zip(vec)
        .map(|(name, v)| format!("{}={:.3}", name, v))
        .collect();
    tracing::info!(
        "recv model={} in_dim={} nonzero={} mean={:.3} std={:.3} sample=[{}]",
        features.kind(), vec.len(), nz, mean, std, sample.join(", ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f32>);

    impl Classifier for Fixed {
        fn predict(&self, _x: &[f32]) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl Classifier for Failing {
        fn predict(&self, _x: &[f32]) -> Result<Vec<f32>> {
            anyhow::bail!("boom")
        }
    }

    fn soil_ctx(dist: Vec<f32>) -> InferenceContext {
        let handle =
            ModelHandle::new(ModelKind::Soil, Scaler::identity(4), Box::new(Fixed(dist))).unwrap();
        InferenceContext::new(None, Some(handle))
    }

    fn soil_vector() -> FeatureVector {
        FeatureVector::new(ModelKind::Soil, vec![90.0, 42.0, 43.0, 6.5])
    }

    #[test]
    fn argmax_prefers_first_of_equal_scores() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some((1, 0.4)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn confidence_is_raw_maximum() {
        let ctx = soil_ctx(vec![0.1, 0.2, 0.3]);
        let r = ctx.predict(&soil_vector()).unwrap();
        assert_eq!(r.class_index, 2);
        assert_eq!(r.label, "High");
        assert_eq!(r.confidence, 0.3);
    }

    #[test]
    fn extra_output_class_fails_closed() {
        let ctx = soil_ctx(vec![0.0, 0.1, 0.2, 0.7]);
        let err = ctx.predict(&soil_vector()).unwrap_err();
        assert!(matches!(err, ApiError::ClassOutOfRange { index: 3, len: 3, .. }));
    }

    #[test]
    fn empty_distribution_is_an_inference_failure() {
        let ctx = soil_ctx(vec![]);
        assert!(matches!(
            ctx.predict(&soil_vector()),
            Err(ApiError::InferenceFailure(_))
        ));
    }

    #[test]
    fn classifier_error_passes_message_through() {
        let handle =
            ModelHandle::new(ModelKind::Soil, Scaler::identity(4), Box::new(Failing)).unwrap();
        let ctx = InferenceContext::new(None, Some(handle));
        match ctx.predict(&soil_vector()) {
            Err(ApiError::InferenceFailure(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected inference failure, got {:?}", other),
        }
    }

    #[test]
    fn nan_scores_are_an_inference_failure() {
        let ctx = soil_ctx(vec![f32::NAN, 0.5, f32::NAN]);
        let err = ctx.predict(&soil_vector()).unwrap_err();
        assert!(matches!(err, ApiError::InferenceFailure(_)));
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn unloaded_model_fails_per_request() {
        let ctx = soil_ctx(vec![1.0, 0.0, 0.0]);
        assert!(!ctx.is_loaded(ModelKind::Crop));
        let crop = FeatureVector::new(ModelKind::Crop, vec![0.0; 7]);
        let err = ctx.predict(&crop).unwrap_err();
        assert_eq!(err.to_string(), "crop model not loaded");
    }

    #[test]
    fn scaler_width_must_match_model() {
        let res = ModelHandle::new(ModelKind::Crop, Scaler::identity(4), Box::new(Fixed(vec![])));
        assert!(res.is_err());
    }

    #[test]
    fn missing_artifacts_leave_service_running() {
        let config = Config {
            crop_model_path: "/nonexistent/crop_model.pt".into(),
            soil_model_path: "/nonexistent/soil_model.pt".into(),
            crop_scaler_path: "/nonexistent/crop_scaler.json".into(),
            soil_scaler_path: "/nonexistent/soil_scaler.json".into(),
            ..Config::default()
        };
        let ctx = InferenceContext::load(&config);
        assert!(!ctx.is_loaded(ModelKind::Crop));
        assert!(!ctx.is_loaded(ModelKind::Soil));
    }
}
