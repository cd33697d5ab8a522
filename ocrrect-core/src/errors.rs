//! # Tipos de Erro
//!
//! Todas as falhas do pipeline de detecção convergem para [`DetectError`].
//! Segmentação e cálculo de features são puros e propagam o erro imediatamente;
//! o estimador externo nunca devolve um veredito padrão quando o processo falha.

use std::path::PathBuf;

use thiserror::Error;

/// Result com [`DetectError`] como erro padrão.
pub type Result<T, E = DetectError> = std::result::Result<T, E>;

/// Erros do pipeline de detecção.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Arquivo de léxico (ou de configuração) ilegível.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuração estruturalmente inválida (janela ≠ 8, conjunto de features vazio...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Largura de vetor incompatível entre treino e predição, ou entre linhas e rótulos.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// `predict` chamado antes de `train`.
    #[error("estimator has not been trained")]
    NotTrained,

    /// O processo externo de treino falhou ou não produziu artefato utilizável.
    #[error("training process failed: {0}")]
    TrainingProcess(String),

    /// O processo externo de predição falhou ou produziu saída inválida.
    #[error("prediction process failed: {0}")]
    PredictionProcess(String),

    /// Um token emitido pelo segmentador não foi localizado no texto original.
    #[error("segmentation error: {0}")]
    Segmentation(String),

    /// Erro de (de)serialização JSON em configuração ou metadados de modelo.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetectError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::TrainingProcess(msg.into())
    }

    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::PredictionProcess(msg.into())
    }

    pub fn segmentation(msg: impl Into<String>) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Falhas causadas pela entrada do chamador (e não pelo ambiente).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::DimensionMismatch { .. } | Self::NotTrained
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DetectError::DimensionMismatch {
            expected: 4,
            found: 3,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 4, found 3");
        assert!(DetectError::NotTrained.to_string().contains("not been trained"));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = DetectError::io(
            "/nao/existe.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/nao/existe.txt"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_errors() {
        assert!(DetectError::configuration("vazio").is_client_error());
        assert!(DetectError::NotTrained.is_client_error());
        assert!(!DetectError::prediction("exit 1").is_client_error());
    }
}
