//! # ocrrect-core — Detecção de Erros de OCR
//!
//! Este crate implementa o pós-processamento de textos produzidos por OCR: para cada
//! palavra do texto, decide se ela provavelmente é um erro de reconhecimento
//! (`qnick`, `f0x`, `jumpcd`). A correção em si (geração e ranqueamento de candidatos)
//! fica fora deste crate; aqui está a etapa de **detecção**.
//!
//! ## Arquitetura do Sistema
//!
//! O sistema segue uma arquitetura de pipeline linear:
//!
//! 1.  **Entrada**: Texto bruto do OCR ([`unit::Text`]).
//! 2.  **Segmentação** ([`segmenter`]): Tokens com offsets (em caracteres) no texto original.
//!     Estágios opcionais ([`processor`]) juntam palavras quebradas no fim da linha e
//!     reagrupam tokens antes das janelas.
//! 3.  **Janelas de Contexto** ([`window`]): Cada token vira uma [`Word`] com 8 posições
//!     (4 antes, foco, 3 depois), com sentinela nas bordas.
//! 4.  **Features** ([`features`]): Providers ([`features::Detectable`]) transformam cada
//!     palavra num vetor de largura fixa. A validade léxica usa o [`lexicon`].
//! 5.  **Classificação** ([`estimator`], [`perceptron`]): Um estimador binário treinado
//!     decide "erro / não erro". O estimador padrão de produção delega a um processo
//!     externo (scikit-learn) via arquivos temporários.
//! 6.  **Saída**: Lista de [`Detection`] na ordem do texto.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use ocrrect_core::{Detector, DetectorConfig, FeatureKind, SegmenterMode};
//! use ocrrect_core::config::{EstimatorConfig, LexiconConfig};
//! use ocrrect_core::unit::TextualUnit;
//!
//! let config = DetectorConfig {
//!     segmenter: SegmenterMode::Whitespace,
//!     lexicon: LexiconConfig {
//!         words: vec!["the".into(), "quick".into(), "fox".into()],
//!         ..LexiconConfig::default()
//!     },
//!     features: vec![FeatureKind::WordValidity],
//!     processors: Vec::new(),
//!     estimator: EstimatorConfig::Perceptron { epochs: 5 },
//! };
//! let mut detector = Detector::from_config(&config).unwrap();
//!
//! // 1. Treina com um rótulo por palavra (true = erro de OCR)
//! detector.train_text("the qnick fox", &[false, true, false]).unwrap();
//!
//! // 2. Detecta
//! for detection in detector.detect("the quick f0x").unwrap() {
//!     println!("{} -> {}", detection.word.text(), detection.erroneous);
//! }
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: Orquestrador que conecta todos os estágios.
//! - [`config`]: Configuração JSON do detector.
//! - [`errors`]: Tipo de erro único do crate.

pub mod config;
pub mod errors;
pub mod estimator;
pub mod features;
pub mod lexicon;
pub mod perceptron;
pub mod pipeline;
pub mod processor;
pub mod segmenter;
pub mod unit;
pub mod window;

pub use config::DetectorConfig;
pub use errors::{DetectError, Result};
pub use estimator::{DetectionEstimator, ExternalConfig, ExternalEstimator};
pub use features::{Detectable, FeatureKind, FeatureSet, FeatureVector, TrainingExample};
pub use lexicon::{CasePolicy, Lexicon};
pub use perceptron::PerceptronEstimator;
pub use pipeline::{Detection, DetectionEvent, Detector};
pub use processor::{ProcessorKind, Processors};
pub use segmenter::{SegmenterMode, Token, WordSegmenter};
pub use window::{Word, WordBuilder};
