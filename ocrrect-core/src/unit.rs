//! # Unidades Textuais
//!
//! Abstração base de tudo que carrega um trecho de texto no pipeline.
//! [`Text`] é a entrada bruta do OCR; [`Token`](crate::segmenter::Token) e
//! [`Word`](crate::window::Word) são unidades **localizadas**, ou seja, sabem o offset
//! (em caracteres) em que começam no texto de origem.

use serde::{Deserialize, Serialize};

/// Um contêiner imutável de texto. O texto pode ser vazio, nunca ausente.
pub trait TextualUnit {
    fn text(&self) -> &str;
}

/// Unidade textual com posição de origem.
///
/// A posição é o índice (0-based) do primeiro caractere da unidade no texto original,
/// contado em caracteres Unicode (não em bytes). É fixada na construção e nunca recalculada.
pub trait LocatedTextualUnit: TextualUnit {
    fn position(&self) -> usize;

    /// Posição logo após o último caractere da unidade.
    fn end_position(&self) -> usize {
        self.position() + self.text().chars().count()
    }
}

/// Texto bruto produzido pelo OCR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Text {
    text: String,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl TextualUnit for Text {
    fn text(&self) -> &str {
        &self.text
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Text {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
