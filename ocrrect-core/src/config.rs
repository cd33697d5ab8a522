//! # Configuração do Detector
//!
//! Um único documento JSON descreve o detector inteiro:
//!
//! ```json
//! {
//!   "segmenter": "penn_treebank",
//!   "lexicon": { "paths": ["words.txt"], "case_policy": "exact", "numeric_words": true },
//!   "features": [{"kind": "word_validity"}, {"kind": "character_existence", "character": "-"}],
//!   "processors": [{"kind": "line_concat"}, {"kind": "multi_punct_split"}],
//!   "estimator": { "kind": "external", "program": "/usr/bin/python3",
//!                  "args": ["scripts/svm_detect.py"], "timeout_ms": 600000 }
//! }
//! ```
//!
//! Todos os campos têm padrão. Caminhos relativos (léxicos, modelo, diretório temporário)
//! são resolvidos a partir do diretório do arquivo de configuração.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{DetectError, Result};
use crate::estimator::{metadata_path, DetectionEstimator, ExternalConfig, ExternalEstimator};
use crate::features::{FeatureKind, FeatureSet};
use crate::lexicon::{CasePolicy, Lexicon};
use crate::perceptron::{PerceptronEstimator, DEFAULT_EPOCHS};
use crate::processor::{ProcessorKind, Processors};
use crate::segmenter::SegmenterMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub segmenter: SegmenterMode,
    #[serde(default)]
    pub lexicon: LexiconConfig,
    #[serde(default = "FeatureKind::defaults")]
    pub features: Vec<FeatureKind>,
    /// Estágios opcionais em volta do segmentador. Padrão: nenhum.
    #[serde(default)]
    pub processors: Vec<ProcessorKind>,
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterMode::default(),
            lexicon: LexiconConfig::default(),
            features: FeatureKind::defaults(),
            processors: Vec::new(),
            estimator: EstimatorConfig::default(),
        }
    }
}

/// Fontes do léxico.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexiconConfig {
    /// Arquivos, uma palavra por linha.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    /// Palavras adicionais declaradas diretamente na configuração.
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub case_policy: CasePolicy,
    #[serde(default)]
    pub numeric_words: bool,
}

impl LexiconConfig {
    pub fn build(&self) -> Result<Lexicon> {
        let lexicon = Lexicon::from_paths_with_policy(&self.paths, self.case_policy)?.merge(
            &Lexicon::from_words_with_policy(self.words.iter().cloned(), self.case_policy),
        );
        Ok(if self.numeric_words {
            lexicon.with_numeric_words()
        } else {
            lexicon
        })
    }
}

/// Escolha do estimador.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorConfig {
    /// Processo externo (ex: scikit-learn).
    External(ExternalConfig),
    /// Perceptron médio em processo.
    Perceptron {
        #[serde(default = "default_epochs")]
        epochs: usize,
    },
}

fn default_epochs() -> usize {
    DEFAULT_EPOCHS
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig::Perceptron {
            epochs: DEFAULT_EPOCHS,
        }
    }
}

impl EstimatorConfig {
    /// Constrói o estimador. Um modelo externo já treinado em `model_path`
    /// (artefato + metadados) é carregado em vez de começar do zero.
    pub fn build(&self) -> Result<Box<dyn DetectionEstimator>> {
        Ok(match self {
            EstimatorConfig::External(config) => match &config.model_path {
                Some(path) if path.is_file() && metadata_path(path).is_file() => {
                    Box::new(ExternalEstimator::load(config.clone())?)
                }
                _ => Box::new(ExternalEstimator::new(config.clone())?),
            },
            EstimatorConfig::Perceptron { epochs } => Box::new(PerceptronEstimator::new(*epochs)),
        })
    }
}

impl DetectorConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Lê a configuração e resolve caminhos relativos a partir do diretório do arquivo.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| DetectError::io(path, e))?;
        let mut config = Self::from_json_str(&raw)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.lexicon.paths.iter_mut().for_each(resolve);
        if let EstimatorConfig::External(external) = &mut self.estimator {
            for path in [&mut external.temp_dir, &mut external.model_path] {
                if let Some(path) = path.as_mut() {
                    resolve(path);
                }
            }
        }
    }

    pub fn build_features(&self, lexicon: &Arc<Lexicon>) -> Result<FeatureSet> {
        FeatureSet::from_kinds(&self.features, lexicon)
    }

    pub fn build_processors(&self, lexicon: &Arc<Lexicon>) -> Processors {
        Processors::from_kinds(&self.processors, lexicon)
    }
}
