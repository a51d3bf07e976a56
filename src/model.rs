use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};
use tch::{kind::Kind, CModule, Device, Tensor};

/// Per-class confidence scores for a single input row.
pub type Distribution = Vec<f32>;

/// Anything that turns one scaled feature row into a confidence distribution.
pub trait Classifier: Send + Sync {
    fn predict(&self, x: &[f32]) -> Result<Distribution>;
}

#[derive(Deserialize)]
struct ScalerJson {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

/// Pre-fitted standard scaler: `(x - mean) / scale` per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl Scaler {
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self> {
        ensure!(
            mean.len() == scale.len(),
            "scaler mean has {} entries but scale has {}",
            mean.len(),
            scale.len()
        );
        // constant features were fitted with scale 0; leave them unscaled
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Ok(Self { mean, scale })
    }

    pub fn identity(width: usize) -> Self {
        Self {
            mean: vec![0.0; width],
            scale: vec![1.0; width],
        }
    }

    /// Reads `{"mean": [...], "scale": [...]}` exported alongside the model.
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read scaler at {}", path.display()))?;
        let raw: ScalerJson = serde_json::from_str(&txt)
            .with_context(|| format!("failed to parse scaler {}", path.display()))?;
        Self::new(raw.mean, raw.scale)
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &[f32]) -> Result<Vec<f32>> {
        if x.len() != self.width() {
            bail!(
                "feature length mismatch: got {}, scaler expects {}",
                x.len(),
                self.width()
            );
        }
        Ok(x
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }
}

/// TorchScript classifier with output shape `[1, n_classes]`.
pub struct TorchClassifier {
    model: CModule,
    device: Device,
    in_dim: usize,
}

impl TorchClassifier {
    pub fn load(model_path: &Path, in_dim: usize, n_classes: usize) -> Result<Self> {
        let device = Device::Cpu;

        let model = CModule::load_on_device(model_path, device)
            .with_context(|| format!("failed to load TorchScript {}", model_path.display()))?;

        // Check output shape with a dummy forward; expect [B=1, C]
        let dummy = Tensor::zeros([1, in_dim as i64], (Kind::Float, device));
        let t = tch::no_grad(|| model.forward_ts(&[dummy]))?;
        let sz = t.size();
        if sz.len() != 2 || sz[0] != 1 {
            bail!("unexpected model output size: {:?}", sz);
        }
        if sz[1] as usize != n_classes {
            bail!(
                "model emits {} classes but {} labels are defined",
                sz[1],
                n_classes
            );
        }

        let classifier = Self {
            model,
            device,
            in_dim,
        };
        // Warmup so the first request doesn't pay for graph setup
        classifier.predict(&vec![0.0; in_dim])?;
        tracing::debug!(path = %model_path.display(), "warmup forward ok");
        Ok(classifier)
    }
}

impl Classifier for TorchClassifier {
    fn predict(&self, x: &[f32]) -> Result<Distribution> {
        if x.len() != self.in_dim {
            bail!(
                "feature length mismatch: got {}, expected {}",
                x.len(),
                self.in_dim
            );
        }

        let input = Tensor::from_slice(x)
            .reshape([1, self.in_dim as i64])
            .to_device(self.device);

        let out = tch::no_grad(|| self.model.forward_ts(&[input]))?;
        let sz = out.size();
        if sz.len() != 2 || sz[0] != 1 {
            bail!("unexpected model output size: {:?}", sz);
        }

        let row = out.to_kind(Kind::Float).reshape([-1]);
        Vec::<f32>::try_from(&row).context("failed to read model output")
    }
}
