use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{ClassifierError, PredictionError};
use crate::models::{FeatureRow, FEATURE_COLUMNS};

/// A trained binary classifier over the 13 feature columns.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Class label, 1 for eligible.
    fn predict(&self, features: &[f64]) -> Result<u8, ClassifierError>;

    /// Probability of the positive class.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ClassifierError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eligibility {
    pub label: u8,
    pub probability: f64,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        self.label == 1
    }

    pub fn confidence_percent(&self) -> f64 {
        self.probability * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assessment {
    /// The student is missing a profile, so nothing was scored.
    NoFeatureData,
    Scored(Eligibility),
}

pub struct EligibilityPredictor {
    classifier: Arc<dyn Classifier>,
}

impl EligibilityPredictor {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn assess(&self, features: Option<&FeatureRow>) -> Result<Assessment, PredictionError> {
        let Some(row) = features else {
            return Ok(Assessment::NoFeatureData);
        };

        let values = row.values();
        if let Some((_, column)) = values
            .iter()
            .zip(FEATURE_COLUMNS)
            .find(|(value, _)| !value.is_finite())
        {
            return Err(PredictionError::Inference(format!("missing value for {column}")));
        }

        let classifier = self.classifier.as_ref();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let label = classifier.predict(&values)?;
            let probability = classifier.predict_proba(&values)?;
            Ok::<_, ClassifierError>((label, probability))
        }));

        let (label, probability) = match outcome {
            Ok(Ok(scored)) => scored,
            Ok(Err(err)) => return Err(PredictionError::Inference(err.to_string())),
            Err(payload) => return Err(PredictionError::Inference(panic_message(&*payload))),
        };

        if label > 1 {
            return Err(PredictionError::Inference(format!(
                "classifier returned label {label}, expected 0 or 1"
            )));
        }
        if !(0.0..=1.0).contains(&probability) {
            return Err(PredictionError::Inference(format!(
                "classifier returned probability {probability}, expected a value in [0, 1]"
            )));
        }

        tracing::info!(
            classifier = classifier.name(),
            label,
            probability,
            "scored student"
        );
        Ok(Assessment::Scored(Eligibility { label, probability }))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("classifier panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("classifier panicked: {message}")
    } else {
        "classifier panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct StubClassifier {
        label: u8,
        probability: f64,
        calls: AtomicUsize,
    }

    impl StubClassifier {
        fn new(label: u8, probability: f64) -> Arc<Self> {
            Arc::new(Self {
                label,
                probability,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Classifier for StubClassifier {
        fn name(&self) -> &str {
            "stub"
        }

        fn predict(&self, features: &[f64]) -> Result<u8, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if features.len() != 13 {
                return Err(ClassifierError(format!("got {} features", features.len())));
            }
            Ok(self.label)
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<f64, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.probability)
        }
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        fn predict(&self, _features: &[f64]) -> Result<u8, ClassifierError> {
            Err(ClassifierError("shape mismatch".to_string()))
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<f64, ClassifierError> {
            Ok(0.5)
        }
    }

    struct PanickingClassifier;

    impl Classifier for PanickingClassifier {
        fn name(&self) -> &str {
            "panicking"
        }

        fn predict(&self, _features: &[f64]) -> Result<u8, ClassifierError> {
            panic!("corrupt tree");
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<f64, ClassifierError> {
            Ok(0.5)
        }
    }

    fn row() -> FeatureRow {
        FeatureRow {
            problems_solved: 120.0,
            assessments_completed: 8.0,
            mini_projects: 3.0,
            certifications_earned: 2.0,
            latest_project_score: 88.0,
            communication: 80.0,
            teamwork: 81.0,
            presentation: 82.0,
            leadership: 83.0,
            critical_thinking: 84.0,
            interpersonal_skills: 85.0,
            mock_interview_score: 90.0,
            internships_completed: 3.0,
        }
    }

    #[test]
    fn scores_a_feature_row() {
        let stub = StubClassifier::new(1, 0.87);
        let predictor = EligibilityPredictor::new(stub.clone());

        let assessment = predictor.assess(Some(&row())).unwrap();
        let Assessment::Scored(eligibility) = assessment else {
            panic!("expected a score, got {assessment:?}");
        };
        assert!(eligibility.is_eligible());
        assert!((eligibility.confidence_percent() - 87.0).abs() < 1e-9);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_features_skip_the_classifier() {
        let stub = StubClassifier::new(1, 0.9);
        let predictor = EligibilityPredictor::new(stub.clone());

        assert_eq!(predictor.assess(None).unwrap(), Assessment::NoFeatureData);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn classifier_errors_become_prediction_errors() {
        let predictor = EligibilityPredictor::new(Arc::new(FailingClassifier));
        let err = predictor.assess(Some(&row())).unwrap_err();
        assert_eq!(err.to_string(), "prediction failed: shape mismatch");
    }

    #[test]
    fn classifier_panics_are_contained() {
        let predictor = EligibilityPredictor::new(Arc::new(PanickingClassifier));
        let err = predictor.assess(Some(&row())).unwrap_err();
        assert!(err.to_string().contains("corrupt tree"), "{err}");
    }

    #[test]
    fn non_finite_features_are_not_scored() {
        let stub = StubClassifier::new(1, 0.9);
        let predictor = EligibilityPredictor::new(stub.clone());
        let mut features = row();
        features.teamwork = f64::NAN;

        let err = predictor.assess(Some(&features)).unwrap_err();
        assert_eq!(err.to_string(), "prediction failed: missing value for teamwork");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn out_of_range_outputs_are_rejected() {
        let predictor = EligibilityPredictor::new(StubClassifier::new(2, 0.5));
        assert!(predictor.assess(Some(&row())).is_err());

        let predictor = EligibilityPredictor::new(StubClassifier::new(0, 1.5));
        assert!(predictor.assess(Some(&row())).is_err());
    }
}
