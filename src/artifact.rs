//! On-disk classifier artifact.
//!
//! The artifact is JSON with a `model_type` tag. A random forest stores its
//! trees as flat node arrays, mirroring a fitted tree ensemble: a split node
//! sends a sample left when `x[feature] <= threshold`, and a leaf holds the
//! per-class sample weights `[negative, positive]`.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ClassifierError, PredictionError};
use crate::models::FEATURE_COLUMNS;
use crate::predictor::Classifier;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum ModelArtifact {
    RandomForest(RandomForest),
    LogisticRegression(LogisticRegression),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    pub feature_names: Vec<String>,
    pub trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: [f64; 2],
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegression {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self, PredictionError> {
        let artifact_error = |message: String| PredictionError::Artifact {
            path: path.to_path_buf(),
            message,
        };

        let raw = std::fs::read_to_string(path).map_err(|err| artifact_error(err.to_string()))?;
        let artifact = Self::from_json(&raw).map_err(artifact_error)?;
        tracing::info!(path = %path.display(), model = artifact.kind(), "loaded model artifact");
        Ok(artifact)
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let artifact: ModelArtifact = serde_json::from_str(raw).map_err(|err| err.to_string())?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::RandomForest(_) => "RandomForestClassifier",
            ModelArtifact::LogisticRegression(_) => "LogisticRegression",
        }
    }

    pub fn feature_names(&self) -> &[String] {
        match self {
            ModelArtifact::RandomForest(forest) => &forest.feature_names,
            ModelArtifact::LogisticRegression(model) => &model.feature_names,
        }
    }

    /// Number of trees, or 1 for a linear model.
    pub fn estimator_count(&self) -> usize {
        match self {
            ModelArtifact::RandomForest(forest) => forest.trees.len(),
            ModelArtifact::LogisticRegression(_) => 1,
        }
    }

    fn validate(&self) -> Result<(), String> {
        let names = self.feature_names();
        if names.len() != FEATURE_COLUMNS.len()
            || names.iter().zip(FEATURE_COLUMNS.iter()).any(|(a, b)| a != b)
        {
            return Err(format!(
                "feature_names must be {:?} in that order, got {:?}",
                FEATURE_COLUMNS, names
            ));
        }

        match self {
            ModelArtifact::RandomForest(forest) => {
                if forest.trees.is_empty() {
                    return Err("random forest has no trees".to_string());
                }
                for (idx, tree) in forest.trees.iter().enumerate() {
                    tree.validate().map_err(|err| format!("tree {idx}: {err}"))?;
                }
            }
            ModelArtifact::LogisticRegression(model) => {
                if model.coefficients.len() != FEATURE_COLUMNS.len() {
                    return Err(format!(
                        "expected {} coefficients, got {}",
                        FEATURE_COLUMNS.len(),
                        model.coefficients.len()
                    ));
                }
            }
        }

        Ok(())
    }

    fn positive_probability(&self, features: &[f64]) -> Result<f64, ClassifierError> {
        if features.len() != FEATURE_COLUMNS.len() {
            return Err(ClassifierError(format!(
                "expected {} features, got {}",
                FEATURE_COLUMNS.len(),
                features.len()
            )));
        }

        match self {
            ModelArtifact::RandomForest(forest) => {
                let mut total = 0.0;
                for tree in forest.trees.iter() {
                    total += tree.positive_share(features)?;
                }
                Ok(total / forest.trees.len() as f64)
            }
            ModelArtifact::LogisticRegression(model) => {
                let score: f64 = model
                    .coefficients
                    .iter()
                    .zip(features)
                    .map(|(weight, value)| weight * value)
                    .sum::<f64>()
                    + model.intercept;
                Ok(1.0 / (1.0 + (-score).exp()))
            }
        }
    }
}

impl DecisionTree {
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= FEATURE_COLUMNS.len() {
                        return Err(format!("node {idx} splits on unknown feature {feature}"));
                    }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(format!("node {idx} points outside the tree"));
                    }
                }
                TreeNode::Leaf { value } => {
                    if value.iter().any(|v| *v < 0.0) || value.iter().sum::<f64>() <= 0.0 {
                        return Err(format!("node {idx} has an empty or negative leaf"));
                    }
                }
            }
        }

        Ok(())
    }

    fn positive_share(&self, features: &[f64]) -> Result<f64, ClassifierError> {
        let mut idx = 0;
        // a well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.nodes.len() {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return Ok(value[1] / (value[0] + value[1])),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }

        Err(ClassifierError("tree walk did not reach a leaf".to_string()))
    }
}

impl Classifier for ModelArtifact {
    fn name(&self) -> &str {
        self.kind()
    }

    fn predict(&self, features: &[f64]) -> Result<u8, ClassifierError> {
        // ties go to class 0, as with an argmax over [p0, p1]
        let probability = self.positive_probability(features)?;
        Ok(u8::from(probability > 0.5))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, ClassifierError> {
        self.positive_probability(features)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn feature_names() -> Vec<&'static str> {
        FEATURE_COLUMNS.to_vec()
    }

    /// Two stumps on problems_solved (index 0) and internships (index 12).
    fn forest_json() -> String {
        json!({
            "model_type": "random_forest",
            "feature_names": feature_names(),
            "trees": [
                { "nodes": [
                    { "feature": 0, "threshold": 100.0, "left": 1, "right": 2 },
                    { "value": [9.0, 1.0] },
                    { "value": [1.0, 3.0] }
                ]},
                { "nodes": [
                    { "feature": 12, "threshold": 2.5, "left": 1, "right": 2 },
                    { "value": [4.0, 0.0] },
                    { "value": [0.0, 5.0] }
                ]}
            ]
        })
        .to_string()
    }

    fn features(problems: f64, internships: f64) -> Vec<f64> {
        let mut values = vec![50.0; 13];
        values[0] = problems;
        values[12] = internships;
        values
    }

    #[test]
    fn forest_averages_leaf_probabilities() {
        let model = ModelArtifact::from_json(&forest_json()).unwrap();
        assert_eq!(model.kind(), "RandomForestClassifier");
        assert_eq!(model.estimator_count(), 2);

        let strong = features(150.0, 3.0);
        let p = model.predict_proba(&strong).unwrap();
        assert!((p - (0.75 + 1.0) / 2.0).abs() < 1e-9);
        assert_eq!(model.predict(&strong).unwrap(), 1);

        let weak = features(20.0, 0.0);
        let p = model.predict_proba(&weak).unwrap();
        assert!((p - 0.05).abs() < 1e-9);
        assert_eq!(model.predict(&weak).unwrap(), 0);
    }

    #[test]
    fn logistic_regression_uses_sigmoid() {
        let raw = json!({
            "model_type": "logistic_regression",
            "feature_names": feature_names(),
            "coefficients": vec![0.0; 13],
            "intercept": 0.0
        })
        .to_string();
        let model = ModelArtifact::from_json(&raw).unwrap();
        let p = model.predict_proba(&features(1.0, 1.0)).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
        assert_eq!(model.predict(&features(1.0, 1.0)).unwrap(), 0);
    }

    #[test]
    fn rejects_reordered_feature_names() {
        let mut names = feature_names();
        names.swap(0, 1);
        let raw = json!({
            "model_type": "logistic_regression",
            "feature_names": names,
            "coefficients": vec![0.0; 13],
            "intercept": 0.0
        })
        .to_string();
        let err = ModelArtifact::from_json(&raw).unwrap_err();
        assert!(err.contains("feature_names"), "{err}");
    }

    #[test]
    fn rejects_dangling_child_index() {
        let raw = json!({
            "model_type": "random_forest",
            "feature_names": feature_names(),
            "trees": [{ "nodes": [
                { "feature": 0, "threshold": 1.0, "left": 1, "right": 7 },
                { "value": [1.0, 1.0] }
            ]}]
        })
        .to_string();
        let err = ModelArtifact::from_json(&raw).unwrap_err();
        assert!(err.contains("tree 0"), "{err}");
    }

    #[test]
    fn cyclic_tree_fails_at_inference() {
        let raw = json!({
            "model_type": "random_forest",
            "feature_names": feature_names(),
            "trees": [{ "nodes": [
                { "feature": 0, "threshold": 1000.0, "left": 1, "right": 1 },
                { "feature": 0, "threshold": 1000.0, "left": 0, "right": 0 }
            ]}]
        })
        .to_string();
        let model = ModelArtifact::from_json(&raw).unwrap();
        assert!(model.predict_proba(&features(1.0, 1.0)).is_err());
    }

    #[test]
    fn wrong_feature_count_is_an_error() {
        let model = ModelArtifact::from_json(&forest_json()).unwrap();
        let err = model.predict(&[1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("expected 13 features"));
    }

    #[test]
    fn load_reports_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ModelArtifact::load(&missing),
            Err(PredictionError::Artifact { .. })
        ));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "not json").unwrap();
        let err = ModelArtifact::load(&corrupt).unwrap_err();
        assert!(err.to_string().contains("corrupt.json"), "{err}");

        let good = dir.path().join("model.json");
        std::fs::write(&good, forest_json()).unwrap();
        assert!(ModelArtifact::load(&good).is_ok());
    }
}
