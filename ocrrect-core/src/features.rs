//! # Features de Detecção
//!
//! Cada provider ([`Detectable`]) observa uma [`Word`] e devolve um número real.
//! O [`FeatureSet`] aplica todos os providers registrados, em ordem, e produz um
//! [`FeatureVector`] de largura fixa por palavra. É esse vetor que o estimador consome.
//!
//! ## Features Implementadas
//!
//! ### Features da palavra em foco
//! - Validade léxica (`1.0` se a palavra está no léxico, `0.0` caso contrário)
//! - Presença de um caractere específico (ex: `-`, `~`)
//! - Proporção de grafemas não alfanuméricos
//! - Proporção de grafemas numéricos
//! - Caixa mista (maiúscula depois de minúscula, ex: `tHe`)
//!
//! ### Features de contexto
//! - Validade do contexto: fração dos vizinhos (n-grama centrado no foco) presentes no léxico
//!
//! Erros de OCR costumam produzir tokens fora do léxico (`qnick`), com símbolos
//! espúrios (`f~ox`) ou com dígitos no lugar de letras (`d0g`).

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::errors::{DetectError, Result};
use crate::lexicon::Lexicon;
use crate::unit::TextualUnit;
use crate::window::{Word, MAX_NGRAM_SIZE, SENTINEL};

/// Valores das features de uma palavra, na ordem dos providers do [`FeatureSet`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    pub values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Produto escalar com um vetor de pesos de mesma largura.
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.values
            .iter()
            .zip(weights)
            .map(|(v, w)| f64::from(*v) * w)
            .sum()
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Um exemplo rotulado: features + "a palavra é um erro de OCR?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub label: bool,
}

/// Provider de uma feature numérica sobre uma palavra.
///
/// Implementações são puras e thread-safe: o [`FeatureSet`] as chama em paralelo.
pub trait Detectable: Send + Sync {
    /// Nome estável, usado em logs e na resposta do serviço.
    fn name(&self) -> &str;

    fn detect(&self, word: &Word) -> f32;
}

/// 1.0 se a palavra em foco está no léxico.
pub struct WordValidity {
    lexicon: Arc<Lexicon>,
}

impl WordValidity {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }
}

impl Detectable for WordValidity {
    fn name(&self) -> &str {
        "word_validity"
    }

    fn detect(&self, word: &Word) -> f32 {
        if self.lexicon.contains(word.text()) {
            1.0
        } else {
            0.0
        }
    }
}

/// 1.0 se a palavra em foco contém o caractere.
pub struct CharacterExistence {
    character: char,
    name: String,
}

impl CharacterExistence {
    pub fn new(character: char) -> Self {
        Self {
            character,
            name: format!("char={character}"),
        }
    }
}

impl Detectable for CharacterExistence {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, word: &Word) -> f32 {
        if word.text().contains(self.character) {
            1.0
        } else {
            0.0
        }
    }
}

/// Fração dos grafemas que satisfazem `pred` (0.0 para texto vazio).
fn grapheme_ratio(text: &str, pred: impl Fn(char) -> bool) -> f32 {
    let mut total = 0usize;
    let mut hits = 0usize;
    for grapheme in text.graphemes(true) {
        total += 1;
        if grapheme.chars().next().map(&pred).unwrap_or(false) {
            hits += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        hits as f32 / total as f32
    }
}

/// Proporção de grafemas não alfanuméricos.
pub struct NonAlphanumericRatio;

impl Detectable for NonAlphanumericRatio {
    fn name(&self) -> &str {
        "non_alphanumeric_ratio"
    }

    fn detect(&self, word: &Word) -> f32 {
        grapheme_ratio(word.text(), |c| !c.is_alphanumeric())
    }
}

/// Proporção de grafemas numéricos.
pub struct DigitRatio;

impl Detectable for DigitRatio {
    fn name(&self) -> &str {
        "digit_ratio"
    }

    fn detect(&self, word: &Word) -> f32 {
        grapheme_ratio(word.text(), char::is_numeric)
    }
}

/// 1.0 se há letra maiúscula depois de uma minúscula (`tHe`, `foX`).
pub struct MixedCase;

impl Detectable for MixedCase {
    fn name(&self) -> &str {
        "mixed_case"
    }

    fn detect(&self, word: &Word) -> f32 {
        let mut seen_lower = false;
        for c in word.text().chars() {
            if c.is_lowercase() {
                seen_lower = true;
            } else if seen_lower && c.is_uppercase() {
                return 1.0;
            }
        }
        0.0
    }
}

/// Fração dos vizinhos no n-grama centrado no foco que pertencem ao léxico.
///
/// Posições fora do documento não contam. Sem nenhum vizinho, o contexto é considerado válido.
pub struct ContextValidity {
    lexicon: Arc<Lexicon>,
    size: usize,
    name: String,
}

impl ContextValidity {
    pub fn new(lexicon: Arc<Lexicon>, size: usize) -> Result<Self> {
        if !(2..=MAX_NGRAM_SIZE).contains(&size) {
            return Err(DetectError::configuration(format!(
                "context validity needs an n-gram size between 2 and {MAX_NGRAM_SIZE}, got {size}"
            )));
        }
        Ok(Self {
            lexicon,
            size,
            name: format!("context_validity_{size}"),
        })
    }
}

impl Detectable for ContextValidity {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, word: &Word) -> f32 {
        let Ok(ngram) = word.ngram(self.size, self.size / 2) else {
            return 0.0;
        };
        let neighbours: Vec<&String> = ngram
            .words
            .iter()
            .enumerate()
            .filter(|(i, w)| *i != ngram.index && w.as_str() != SENTINEL)
            .map(|(_, w)| w)
            .collect();
        if neighbours.is_empty() {
            return 1.0;
        }
        let valid = neighbours.iter().filter(|w| self.lexicon.contains(w)).count();
        valid as f32 / neighbours.len() as f32
    }
}

/// Seleção de providers por configuração.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    WordValidity,
    CharacterExistence { character: char },
    NonAlphanumericRatio,
    DigitRatio,
    MixedCase,
    ContextValidity { size: usize },
}

impl FeatureKind {
    pub fn build(&self, lexicon: &Arc<Lexicon>) -> Result<Box<dyn Detectable>> {
        Ok(match self {
            FeatureKind::WordValidity => Box::new(WordValidity::new(Arc::clone(lexicon))),
            FeatureKind::CharacterExistence { character } => {
                Box::new(CharacterExistence::new(*character))
            }
            FeatureKind::NonAlphanumericRatio => Box::new(NonAlphanumericRatio),
            FeatureKind::DigitRatio => Box::new(DigitRatio),
            FeatureKind::MixedCase => Box::new(MixedCase),
            FeatureKind::ContextValidity { size } => {
                Box::new(ContextValidity::new(Arc::clone(lexicon), *size)?)
            }
        })
    }

    /// Conjunto usado quando a configuração não lista features.
    pub fn defaults() -> Vec<FeatureKind> {
        vec![
            FeatureKind::WordValidity,
            FeatureKind::NonAlphanumericRatio,
            FeatureKind::DigitRatio,
            FeatureKind::MixedCase,
        ]
    }
}

/// Lista ordenada e não vazia de providers.
pub struct FeatureSet {
    providers: Vec<Box<dyn Detectable>>,
}

impl FeatureSet {
    pub fn new(providers: Vec<Box<dyn Detectable>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(DetectError::configuration(
                "feature set needs at least one provider",
            ));
        }
        Ok(Self { providers })
    }

    pub fn from_kinds(kinds: &[FeatureKind], lexicon: &Arc<Lexicon>) -> Result<Self> {
        let providers = kinds
            .iter()
            .map(|kind| kind.build(lexicon))
            .collect::<Result<Vec<_>>>()?;
        Self::new(providers)
    }

    /// Largura dos vetores produzidos.
    pub fn width(&self) -> usize {
        self.providers.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn score(&self, word: &Word) -> FeatureVector {
        FeatureVector::new(self.providers.iter().map(|p| p.detect(word)).collect())
    }

    /// Vetores de todas as palavras, calculados em paralelo, na ordem de entrada.
    pub fn score_all(&self, words: &[Word]) -> Vec<FeatureVector> {
        let vectors: Vec<FeatureVector> = words.par_iter().map(|w| self.score(w)).collect();
        debug!(words = words.len(), width = self.width(), "features scored");
        vectors
    }
}

impl fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureSet")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::{segment_with_mode, SegmenterMode};
    use crate::window::build_words;

    fn words(text: &str) -> Vec<Word> {
        build_words(&segment_with_mode(text, SegmenterMode::Whitespace).unwrap())
    }

    fn lexicon() -> Arc<Lexicon> {
        Arc::new(Lexicon::from_words(["the", "quick", "brown", "fox"]))
    }

    #[test]
    fn test_word_validity_polarity() {
        let feature = WordValidity::new(lexicon());
        let ws = words("the qnick fox");
        assert_eq!(feature.detect(&ws[0]), 1.0);
        assert_eq!(feature.detect(&ws[1]), 0.0);
        assert_eq!(feature.detect(&ws[2]), 1.0);
    }

    #[test]
    fn test_character_existence() {
        let feature = CharacterExistence::new('~');
        let ws = words("f~ox fox");
        assert_eq!(feature.detect(&ws[0]), 1.0);
        assert_eq!(feature.detect(&ws[1]), 0.0);
        assert_eq!(feature.name(), "char=~");
    }

    #[test]
    fn test_ratios() {
        let ws = words("d0g ab,. 123 é");
        assert!((DigitRatio.detect(&ws[0]) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(NonAlphanumericRatio.detect(&ws[1]), 0.5);
        assert_eq!(DigitRatio.detect(&ws[2]), 1.0);
        assert_eq!(NonAlphanumericRatio.detect(&ws[3]), 0.0);
    }

    #[test]
    fn test_ratio_of_empty_text_is_zero() {
        assert_eq!(grapheme_ratio("", |c| c.is_numeric()), 0.0);
    }

    #[test]
    fn test_mixed_case() {
        let ws = words("tHe The THE the");
        assert_eq!(MixedCase.detect(&ws[0]), 1.0);
        assert_eq!(MixedCase.detect(&ws[1]), 0.0);
        assert_eq!(MixedCase.detect(&ws[2]), 0.0);
        assert_eq!(MixedCase.detect(&ws[3]), 0.0);
    }

    #[test]
    fn test_context_validity() {
        let feature = ContextValidity::new(lexicon(), 3).unwrap();
        let ws = words("the qnick fox jumpcd");
        // "qnick": vizinhos "the" e "fox", ambos válidos
        assert_eq!(feature.detect(&ws[1]), 1.0);
        // "fox": vizinhos "qnick" e "jumpcd"
        assert_eq!(feature.detect(&ws[2]), 0.0);
        // "the": só "qnick" (a esquerda é sentinela)
        assert_eq!(feature.detect(&ws[0]), 0.0);

        let alone = words("solo");
        assert_eq!(feature.detect(&alone[0]), 1.0);

        assert!(ContextValidity::new(lexicon(), 1).is_err());
        assert!(ContextValidity::new(lexicon(), 6).is_err());
    }

    #[test]
    fn test_empty_feature_set_is_rejected() {
        let err = FeatureSet::new(Vec::new()).unwrap_err();
        assert!(matches!(err, DetectError::Configuration(_)));
        assert!(FeatureSet::from_kinds(&[], &lexicon()).is_err());
    }

    #[test]
    fn test_feature_set_scores_in_order() {
        let set = FeatureSet::from_kinds(
            &[
                FeatureKind::WordValidity,
                FeatureKind::CharacterExistence { character: '-' },
                FeatureKind::MixedCase,
            ],
            &lexicon(),
        )
        .unwrap();
        assert_eq!(set.width(), 3);
        assert_eq!(set.names(), ["word_validity", "char=-", "mixed_case"]);

        let ws = words("the bro-wn foX");
        let vectors = set.score_all(&ws);
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0].values, [1.0, 0.0, 0.0]);
        assert_eq!(vectors[1].values, [0.0, 1.0, 0.0]);
        assert_eq!(vectors[2].values, [0.0, 0.0, 1.0]);
        assert!(vectors.iter().all(|v| v.width() == set.width()));
    }

    #[test]
    fn test_feature_kind_from_config() {
        let kinds: Vec<FeatureKind> = serde_json::from_str(
            r#"[{"kind": "word_validity"}, {"kind": "character_existence", "character": "-"},
                {"kind": "context_validity", "size": 3}]"#,
        )
        .unwrap();
        assert_eq!(kinds[1], FeatureKind::CharacterExistence { character: '-' });
        assert_eq!(kinds[2], FeatureKind::ContextValidity { size: 3 });
        assert!(FeatureSet::from_kinds(&kinds, &lexicon()).is_ok());
    }

    #[test]
    fn test_dot_product() {
        let v = FeatureVector::from(vec![1.0, 0.5]);
        assert_eq!(v.dot(&[2.0, 4.0]), 4.0);
    }
}
