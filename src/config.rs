use std::{env, path::PathBuf, time::Duration};

use crate::types::ModelKind;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Startup settings, read once from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub crop_model_path: PathBuf,
    pub soil_model_path: PathBuf,
    pub crop_scaler_path: PathBuf,
    pub soil_scaler_path: PathBuf,
    pub request_timeout: Duration,
    /// `LOG_PRED=1`: log feature vector stats before each inference.
    pub log_features: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            crop_model_path: PathBuf::from("crop_model.pt"),
            soil_model_path: PathBuf::from("soil_model.pt"),
            crop_scaler_path: PathBuf::from("crop_scaler.json"),
            soil_scaler_path: PathBuf::from("soil_scaler.json"),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            log_features: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the config from any variable source; unset variables keep
    /// their defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = get("PORT") {
            cfg.port = parse("PORT", v)?;
        }
        if let Some(v) = get("CROP_MODEL_PATH") {
            cfg.crop_model_path = PathBuf::from(v);
        }
        if let Some(v) = get("SOIL_MODEL_PATH") {
            cfg.soil_model_path = PathBuf::from(v);
        }
        if let Some(v) = get("CROP_SCALER_PATH") {
            cfg.crop_scaler_path = PathBuf::from(v);
        }
        if let Some(v) = get("SOIL_SCALER_PATH") {
            cfg.soil_scaler_path = PathBuf::from(v);
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout = Duration::from_secs(parse("REQUEST_TIMEOUT_SECS", v)?);
        }
        cfg.log_features = get("LOG_PRED").as_deref() == Some("1");

        Ok(cfg)
    }

    pub fn model_path(&self, kind: ModelKind) -> &PathBuf {
        match kind {
            ModelKind::Crop => &self.crop_model_path,
            ModelKind::Soil => &self.soil_model_path,
        }
    }

    pub fn scaler_path(&self, kind: ModelKind) -> &PathBuf {
        match kind {
            ModelKind::Crop => &self.crop_scaler_path,
            ModelKind::Soil => &self.soil_scaler_path,
        }
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.model_path(ModelKind::Soil), &PathBuf::from("soil_model.pt"));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert!(!cfg.log_features);
    }

    #[test]
    fn env_overrides_are_applied() {
        let cfg = Config::from_lookup(lookup(&[
            ("PORT", "8081"),
            ("CROP_SCALER_PATH", "/models/crop.json"),
            ("LOG_PRED", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.scaler_path(ModelKind::Crop), &PathBuf::from("/models/crop.json"));
        assert!(cfg.log_features);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = Config::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
