//! # Averaged Perceptron Binário
//!
//! Estimador em processo, alternativa à ponte externa: mesmo trait, mesmas garantias,
//! sem dependência de Python. Útil em testes, no serviço web sem scikit-learn e como
//! linha de base.
//!
//! Utiliza "Lazy Averaging" para evitar custo O(N*T) na atualização dos pesos médios.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{DetectError, Result};
use crate::estimator::{check_rows, check_training_set, DetectionEstimator};
use crate::features::FeatureVector;

/// Épocas padrão de treino.
pub const DEFAULT_EPOCHS: usize = 10;

/// Perceptron médio com viés.
///
/// O Perceptron é um algoritmo de aprendizado **online** e **mistake-driven**:
/// processa um vetor por vez e só atualiza os pesos se errar a predição.
/// O modelo final usa a **média** dos pesos ao longo de todos os passos,
/// o que estabiliza o aprendizado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptronEstimator {
    epochs: usize,
    /// Pesos médios, um por feature, seguidos do viés.
    weights: Vec<f64>,
    width: Option<usize>,
}

impl PerceptronEstimator {
    pub fn new(epochs: usize) -> Self {
        Self {
            epochs: epochs.max(1),
            weights: Vec::new(),
            width: None,
        }
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    fn score(&self, row: &FeatureVector) -> f64 {
        let bias = self.weights.last().copied().unwrap_or(0.0);
        row.dot(&self.weights) + bias
    }
}

impl Default for PerceptronEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCHS)
    }
}

/// Estado de treino com lazy averaging.
struct Averager {
    weights: Vec<f64>,
    /// Soma acumulada dos pesos: $\sum w_t$.
    totals: Vec<f64>,
    /// Último passo em que cada peso mudou.
    last_update: Vec<usize>,
    steps: usize,
}

impl Averager {
    fn new(len: usize) -> Self {
        Self {
            weights: vec![0.0; len],
            totals: vec![0.0; len],
            last_update: vec![0; len],
            steps: 0,
        }
    }

    fn score(&self, row: &FeatureVector) -> f64 {
        row.dot(&self.weights) + self.weights[self.weights.len() - 1]
    }

    fn update_weight(&mut self, i: usize, delta: f64) {
        // Acumula o peso antigo pelos passos em que ficou constante
        let held = (self.steps - self.last_update[i]) as f64;
        self.totals[i] += held * self.weights[i];
        self.last_update[i] = self.steps;
        self.weights[i] += delta;
    }

    fn update(&mut self, row: &FeatureVector, direction: f64) {
        for (i, value) in row.values.iter().enumerate() {
            if *value != 0.0 {
                self.update_weight(i, direction * f64::from(*value));
            }
        }
        let bias = self.weights.len() - 1;
        self.update_weight(bias, direction);
    }

    /// Pesos médios ($\sum w_t / T$).
    fn finalize(mut self) -> Vec<f64> {
        for i in 0..self.weights.len() {
            let held = (self.steps - self.last_update[i]) as f64;
            self.totals[i] += held * self.weights[i];
        }
        if self.steps == 0 {
            return self.weights;
        }
        let steps = self.steps as f64;
        self.totals.into_iter().map(|total| total / steps).collect()
    }
}

impl DetectionEstimator for PerceptronEstimator {
    fn train(&mut self, rows: &[FeatureVector], labels: &[bool]) -> Result<()> {
        let width = check_training_set(rows, labels)?;
        let mut averager = Averager::new(width + 1);
        let mut mistakes = 0usize;

        for _ in 0..self.epochs {
            for (row, label) in rows.iter().zip(labels) {
                let predicted = averager.score(row) > 0.0;
                if predicted != *label {
                    averager.update(row, if *label { 1.0 } else { -1.0 });
                    mistakes += 1;
                }
                averager.steps += 1;
            }
        }

        self.weights = averager.finalize();
        self.width = Some(width);
        info!(rows = rows.len(), width, epochs = self.epochs, mistakes, "perceptron trained");
        Ok(())
    }

    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<bool>> {
        let width = self.width.ok_or(DetectError::NotTrained)?;
        check_rows(rows, width)?;
        Ok(rows.iter().map(|row| self.score(row) > 0.0).collect())
    }

    fn width(&self) -> Option<usize> {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::TrainingExample;

    fn rows(values: &[&[f32]]) -> Vec<FeatureVector> {
        values.iter().map(|v| FeatureVector::from(v.to_vec())).collect()
    }

    #[test]
    fn test_perceptron_learning_lazy() {
        let mut model = PerceptronEstimator::new(5);
        model
            .train(&rows(&[&[1.0, 0.0], &[0.0, 1.0]]), &[true, false])
            .unwrap();

        assert_eq!(model.weights.len(), 3);
        assert!((model.weights[0] - 1.0).abs() < 1e-9);
        assert!((model.weights[1] + 0.9).abs() < 1e-9);
        assert!((model.weights[2] - 0.1).abs() < 1e-9);
        assert_eq!(
            model.predict(&rows(&[&[1.0, 0.0], &[0.0, 1.0]])).unwrap(),
            [true, false]
        );
    }

    #[test]
    fn test_separates_invalid_words() {
        // [word_validity, digit_ratio]: fora do léxico ou com dígitos = erro
        let train = rows(&[
            &[1.0, 0.0],
            &[0.0, 0.25],
            &[1.0, 0.0],
            &[0.0, 0.0],
            &[1.0, 0.1],
            &[0.0, 0.5],
        ]);
        let labels = [false, true, false, true, false, true];
        let mut model = PerceptronEstimator::default();
        model.train(&train, &labels).unwrap();
        assert_eq!(model.predict(&train).unwrap(), labels);
    }

    #[test]
    fn test_guards() {
        let mut model = PerceptronEstimator::default();
        assert!(matches!(
            model.predict(&rows(&[&[1.0]])),
            Err(DetectError::NotTrained)
        ));
        assert!(matches!(
            model.train(&[], &[]),
            Err(DetectError::Configuration(_))
        ));

        model.train(&rows(&[&[1.0, 0.0]]), &[true]).unwrap();
        assert!(matches!(
            model.predict(&rows(&[&[1.0]])),
            Err(DetectError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_fit_from_examples() {
        let examples: Vec<TrainingExample> = [(vec![1.0, 0.0], true), (vec![0.0, 1.0], false)]
            .into_iter()
            .map(|(values, label)| TrainingExample {
                features: FeatureVector::from(values),
                label,
            })
            .collect();
        let mut model = PerceptronEstimator::new(5);
        model.fit(&examples).unwrap();
        assert_eq!(model.width(), Some(2));
        assert_eq!(
            model.predict(&rows(&[&[1.0, 0.0], &[0.0, 1.0]])).unwrap(),
            [true, false]
        );
        assert!(matches!(model.fit(&[]), Err(DetectError::Configuration(_))));
    }

    #[test]
    fn test_retraining_replaces_model() {
        let mut model = PerceptronEstimator::new(3);
        model.train(&rows(&[&[1.0]]), &[true]).unwrap();
        model.train(&rows(&[&[1.0, 1.0, 1.0]]), &[false]).unwrap();
        assert_eq!(model.width(), Some(3));
        assert_eq!(model.predict(&rows(&[&[1.0, 1.0, 1.0]])).unwrap(), [false]);
    }
}
