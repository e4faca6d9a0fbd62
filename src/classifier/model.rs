//! Tier 2 of the cascade: a pretrained TF-IDF vectorizer plus linear
//! classifier, exported to JSON offline and loaded once at startup. The pair
//! is opaque to the rest of the pipeline: text in, label out, no call-time
//! error channel. A missing or malformed asset aborts startup.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::domain::IntentLabel;

static TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9']+").expect("valid token regex"));

/// Synchronous label prediction, infallible at call time.
pub trait IntentModel: Send + Sync {
    fn predict(&self, text: &str) -> IntentLabel;
}

#[derive(Debug, Deserialize)]
struct ModelAsset {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    classes: Vec<String>,
    /// One weight row per class, each of vocabulary length.
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

pub struct TfidfIntentModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    classes: Vec<IntentLabel>,
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl TfidfIntentModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read model asset {}", path.display()))?;
        let asset: ModelAsset = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse model asset {}", path.display()))?;
        Self::from_asset(asset)
            .with_context(|| format!("invalid model asset {}", path.display()))
    }

    fn from_asset(asset: ModelAsset) -> Result<Self> {
        let dims = asset.vocabulary.len();
        if asset.idf.len() != dims {
            bail!("idf length {} does not match vocabulary size {dims}", asset.idf.len());
        }
        if asset.classes.is_empty()
            || asset.weights.len() != asset.classes.len()
            || asset.intercepts.len() != asset.classes.len()
        {
            bail!("class, weight and intercept counts do not line up");
        }
        if asset.weights.iter().any(|row| row.len() != dims) {
            bail!("weight row length does not match vocabulary size {dims}");
        }
        if asset.vocabulary.values().any(|&index| index >= dims) {
            bail!("vocabulary index exceeds feature dimension {dims}");
        }
        let classes = asset
            .classes
            .iter()
            .map(|name| {
                IntentLabel::parse(name).with_context(|| format!("unknown class label {name:?}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            vocabulary: asset.vocabulary,
            idf: asset.idf,
            classes,
            weights: asset.weights,
            intercepts: asset.intercepts,
        })
    }

    /// L2-normalized TF-IDF vector as sparse (index, value) pairs.
    fn vectorize(&self, text: &str) -> Vec<(usize, f64)> {
        let lowered = text.to_lowercase();
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in TOKEN_REGEX.find_iter(&lowered) {
            if let Some(&index) = self.vocabulary.get(token.as_str()) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }
        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, value) in entries.iter_mut() {
                *value /= norm;
            }
        }
        entries
    }
}

impl IntentModel for TfidfIntentModel {
    fn predict(&self, text: &str) -> IntentLabel {
        let features = self.vectorize(text);
        let mut best = (0, f64::NEG_INFINITY);
        for (class_index, (row, intercept)) in
            self.weights.iter().zip(&self.intercepts).enumerate()
        {
            let score = intercept
                + features
                    .iter()
                    .map(|(index, value)| row[*index] * value)
                    .sum::<f64>();
            if score > best.1 {
                best = (class_index, score);
            }
        }
        self.classes[best.0]
    }
}
