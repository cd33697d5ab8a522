//! # Pipeline de Detecção — Orquestrador com Eventos Observáveis
//!
//! O [`Detector`] coordena os módulos na ordem do fluxo de dados:
//!
//! ```text
//! texto → [processadores de texto] → segmentador → [processadores de tokens]
//!       → janelas de contexto → features → estimador → vereditos
//! ```
//!
//! Além da API síncrona ([`Detector::detect`]), o detector pode emitir eventos de
//! progresso por um canal (`mpsc`) em [`Detector::detect_streaming`], para que quem
//! chama (ex: o serviço web) acompanhe cada etapa.

use std::sync::{mpsc, Arc};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::errors::{DetectError, Result};
use crate::estimator::DetectionEstimator;
use crate::features::{FeatureSet, FeatureVector, TrainingExample};
use crate::processor::Processors;
use crate::segmenter::WordSegmenter;
use crate::unit::Text;
use crate::window::{build_words, Word};

/// Veredito para uma palavra.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub word: Word,
    /// `true` se a palavra foi classificada como erro de OCR.
    pub erroneous: bool,
}

/// Eventos emitidos durante a detecção.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DetectionEvent {
    /// **Passo 1**: texto segmentado e janelas montadas.
    SegmentationDone { words: Vec<Word>, total: usize },
    /// **Passo 2**: vetores de features calculados.
    FeaturesScored {
        total: usize,
        width: usize,
        names: Vec<String>,
    },
    /// **Conclusão**: vereditos de todas as palavras.
    Done {
        detections: Vec<Detection>,
        total_words: usize,
        processing_ms: u64,
    },
    /// **Falha**: a detecção foi interrompida.
    Error { message: String },
}

/// O detector: segmentador + processadores + features + estimador.
pub struct Detector {
    segmenter: Box<dyn WordSegmenter>,
    processors: Processors,
    features: FeatureSet,
    estimator: Box<dyn DetectionEstimator>,
}

impl Detector {
    pub fn new(
        segmenter: Box<dyn WordSegmenter>,
        features: FeatureSet,
        estimator: Box<dyn DetectionEstimator>,
    ) -> Self {
        Self {
            segmenter,
            processors: Processors::default(),
            features,
            estimator,
        }
    }

    /// Monta o detector descrito pela configuração (carrega léxicos e, se houver, o modelo treinado).
    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        let lexicon = Arc::new(config.lexicon.build()?);
        info!(
            entries = lexicon.len(),
            segmenter = ?config.segmenter,
            processors = ?config.processors,
            features = config.features.len(),
            "building detector"
        );
        let features = config.build_features(&lexicon)?;
        let estimator = config.estimator.build()?;
        Ok(Self::new(Box::new(config.segmenter), features, estimator)
            .with_processors(config.build_processors(&lexicon)))
    }

    /// Estágios aplicados antes e depois do segmentador.
    pub fn with_processors(mut self, processors: Processors) -> Self {
        self.processors = processors;
        self
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn estimator(&self) -> &dyn DetectionEstimator {
        self.estimator.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.estimator.is_trained()
    }

    /// Segmenta o texto e monta uma palavra com contexto por token.
    ///
    /// Os processadores de texto preservam o número de caracteres, então as posições
    /// das palavras valem para o texto recebido.
    pub fn words(&self, text: &str) -> Result<Vec<Word>> {
        let prepared = self.processors.prepare(text);
        let tokens = self.segmenter.segment(&Text::new(prepared.as_ref()))?;
        let tokens = self.processors.refine(tokens);
        Ok(build_words(&tokens))
    }

    pub fn featurize(&self, words: &[Word]) -> Vec<FeatureVector> {
        self.features.score_all(words)
    }

    /// Pareia as features de cada palavra com o seu rótulo (`true` = erro).
    pub fn examples(&self, words: &[Word], labels: &[bool]) -> Result<Vec<TrainingExample>> {
        if words.len() != labels.len() {
            return Err(DetectError::DimensionMismatch {
                expected: words.len(),
                found: labels.len(),
            });
        }
        Ok(self
            .featurize(words)
            .into_iter()
            .zip(labels)
            .map(|(features, &label)| TrainingExample { features, label })
            .collect())
    }

    /// Treina com palavras já montadas e seus rótulos.
    pub fn train(&mut self, words: &[Word], labels: &[bool]) -> Result<()> {
        let examples = self.examples(words, labels)?;
        self.estimator.fit(&examples)
    }

    /// Treina a partir de texto: um rótulo por palavra segmentada.
    pub fn train_text(&mut self, text: &str, labels: &[bool]) -> Result<usize> {
        let words = self.words(text)?;
        self.train(&words, labels)?;
        Ok(words.len())
    }

    pub fn predict(&self, words: &[Word]) -> Result<Vec<bool>> {
        if words.is_empty() {
            // Sem palavras não há o que perguntar, mas o contrato do estimador vale
            if !self.estimator.is_trained() {
                return Err(DetectError::NotTrained);
            }
            return Ok(Vec::new());
        }
        let rows = self.featurize(words);
        self.estimator.predict(&rows)
    }

    /// Vereditos para todas as palavras do texto, na ordem de entrada.
    pub fn detect(&self, text: &str) -> Result<Vec<Detection>> {
        self.run(text, None)
    }

    /// Como [`Detector::detect`], enviando eventos de progresso pelo canal.
    pub fn detect_streaming(
        &self,
        text: &str,
        tx: mpsc::Sender<DetectionEvent>,
    ) -> Result<Vec<Detection>> {
        let result = self.run(text, Some(&tx));
        if let Err(err) = &result {
            let _ = tx.send(DetectionEvent::Error {
                message: err.to_string(),
            });
        }
        result
    }

    fn run(&self, text: &str, tx: Option<&mpsc::Sender<DetectionEvent>>) -> Result<Vec<Detection>> {
        let start = Instant::now();
        let send = |event: DetectionEvent| {
            if let Some(tx) = tx {
                let _ = tx.send(event);
            }
        };

        // === Passo 1: Segmentação e janelas ===
        let words = self.words(text)?;
        debug!(words = words.len(), "context windows built");
        if tx.is_some() {
            send(DetectionEvent::SegmentationDone {
                words: words.clone(),
                total: words.len(),
            });
        }

        // === Passo 2: Features ===
        let rows = self.featurize(&words);
        send(DetectionEvent::FeaturesScored {
            total: rows.len(),
            width: self.features.width(),
            names: self.features.names().into_iter().map(String::from).collect(),
        });

        // === Passo 3: Classificação ===
        let verdicts = if words.is_empty() {
            if !self.estimator.is_trained() {
                return Err(DetectError::NotTrained);
            }
            Vec::new()
        } else {
            self.estimator.predict(&rows)?
        };

        let detections: Vec<Detection> = words
            .into_iter()
            .zip(verdicts)
            .map(|(word, erroneous)| Detection { word, erroneous })
            .collect();

        let processing_ms = start.elapsed().as_millis() as u64;
        info!(
            words = detections.len(),
            flagged = detections.iter().filter(|d| d.erroneous).count(),
            processing_ms,
            "detection finished"
        );
        if tx.is_some() {
            send(DetectionEvent::Done {
                detections: detections.clone(),
                total_words: detections.len(),
                processing_ms,
            });
        }
        Ok(detections)
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("processors", &self.processors)
            .field("features", &self.features)
            .field("trained_width", &self.estimator.width())
            .finish()
    }
}
