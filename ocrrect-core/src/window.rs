//! # Janela de Contexto
//!
//! Cada token vira uma [`Word`]: o token em foco mais uma janela fixa de oito posições,
//! quatro à esquerda e três à direita.
//!
//! ```text
//!  índice:   0    1    2    3  [ 4 ]  5    6    7
//!           ─────── antes ──── foco ── depois ──
//! ```
//!
//! Posições que caem antes do início ou depois do fim do documento recebem o
//! sentinela [`SENTINEL`] (string vazia). Assim toda palavra tem exatamente o mesmo
//! formato, e os providers de features não precisam tratar bordas.
//!
//! ## N-gramas
//!
//! [`Word::ngram`] extrai uma sub-janela de tamanho 1 a 5 que contém o foco, com o foco
//! no índice pedido. É a base de features que olham para a vizinhança da palavra.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DetectError, Result};
use crate::segmenter::Token;
use crate::unit::{LocatedTextualUnit, TextualUnit};

/// Número de posições da janela.
pub const CONTEXT_SIZE: usize = 8;
/// Índice do foco dentro da janela.
pub const FOCUS_INDEX: usize = 4;
/// Texto usado para posições fora do documento.
pub const SENTINEL: &str = "";
/// Maior n-grama extraível de uma janela.
pub const MAX_NGRAM_SIZE: usize = 5;

/// Um token em foco com seu contexto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Word {
    position: usize,
    context: [String; CONTEXT_SIZE],
}

impl Word {
    pub fn new(position: usize, context: [String; CONTEXT_SIZE]) -> Self {
        Self { position, context }
    }

    /// Constrói a partir de uma sequência de tamanho arbitrário; qualquer tamanho
    /// diferente de [`CONTEXT_SIZE`] é erro de configuração.
    pub fn from_context(position: usize, context: Vec<String>) -> Result<Self> {
        let context: [String; CONTEXT_SIZE] = context.try_into().map_err(|c: Vec<String>| {
            DetectError::configuration(format!(
                "context window must have {CONTEXT_SIZE} tokens, got {}",
                c.len()
            ))
        })?;
        Ok(Self::new(position, context))
    }

    pub fn context(&self) -> &[String; CONTEXT_SIZE] {
        &self.context
    }

    /// As quatro posições antes do foco.
    pub fn before(&self) -> &[String] {
        &self.context[..FOCUS_INDEX]
    }

    /// As três posições depois do foco.
    pub fn after(&self) -> &[String] {
        &self.context[FOCUS_INDEX + 1..]
    }

    /// N-grama de tamanho `size` em que o foco ocupa o índice `index`.
    ///
    /// Falha se `size` estiver fora de `1..=5` ou se o n-grama não couber na janela
    /// (por exemplo, tamanho 5 com o foco no índice 0 precisaria de quatro posições à direita).
    pub fn ngram(&self, size: usize, index: usize) -> Result<Ngram> {
        if size == 0 || size > MAX_NGRAM_SIZE {
            return Err(DetectError::configuration(format!(
                "n-gram size must be between 1 and {MAX_NGRAM_SIZE}, got {size}"
            )));
        }
        if index >= size || index > FOCUS_INDEX || FOCUS_INDEX - index + size > CONTEXT_SIZE {
            return Err(DetectError::configuration(format!(
                "focus index {index} does not fit a {size}-gram"
            )));
        }
        let start = FOCUS_INDEX - index;
        Ok(Ngram {
            index,
            position: self.position,
            words: self.context[start..start + size].to_vec(),
        })
    }

    /// Todos os n-gramas de tamanho `size` que contêm o foco, em ordem de índice.
    pub fn ngrams(&self, size: usize) -> Result<Vec<Ngram>> {
        if size == 0 || size > MAX_NGRAM_SIZE {
            return Err(DetectError::configuration(format!(
                "n-gram size must be between 1 and {MAX_NGRAM_SIZE}, got {size}"
            )));
        }
        Ok((0..size).filter_map(|index| self.ngram(size, index).ok()).collect())
    }
}

impl TextualUnit for Word {
    fn text(&self) -> &str {
        &self.context[FOCUS_INDEX]
    }
}

impl LocatedTextualUnit for Word {
    fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <", self.text())?;
        for (i, slot) in self.context.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{:?}", slot)?;
        }
        write!(f, ">")
    }
}

/// Sub-janela contígua que contém o foco.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ngram {
    /// Índice do foco dentro de `words`.
    pub index: usize,
    /// Posição da palavra de origem.
    pub position: usize,
    pub words: Vec<String>,
}

impl Ngram {
    pub fn focus(&self) -> &str {
        &self.words[self.index]
    }

    /// Verdadeiro se alguma posição do n-grama está fora do documento.
    pub fn touches_boundary(&self) -> bool {
        self.words.iter().any(|w| w == SENTINEL)
    }
}

impl fmt::Display for Ngram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.words.join(" "))
    }
}

/// Montagem incremental de uma [`Word`], uma posição por vez.
#[derive(Debug, Clone, Default)]
pub struct WordBuilder {
    position: usize,
    slots: Vec<String>,
}

impl WordBuilder {
    pub fn new(position: usize) -> Self {
        Self {
            position,
            slots: Vec::with_capacity(CONTEXT_SIZE),
        }
    }

    pub fn push(mut self, text: impl Into<String>) -> Self {
        self.slots.push(text.into());
        self
    }

    /// Adiciona o texto do token, ou o sentinela quando não há token.
    pub fn push_token(self, token: Option<&Token>) -> Self {
        match token {
            Some(token) => self.push(token.text()),
            None => self.push(SENTINEL),
        }
    }

    pub fn build(self) -> Result<Word> {
        Word::from_context(self.position, self.slots)
    }
}

/// Converte a sequência de tokens em palavras com contexto, uma por token, na mesma ordem.
pub fn build_words(tokens: &[Token]) -> Vec<Word> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, focus)| {
            let mut context: [String; CONTEXT_SIZE] = Default::default();
            for (slot, text) in context.iter_mut().enumerate() {
                if let Some(token) = (i + slot)
                    .checked_sub(FOCUS_INDEX)
                    .and_then(|j| tokens.get(j))
                {
                    *text = token.text().to_string();
                }
            }
            Word::new(focus.position(), context)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<Token> {
        let mut pos = 0;
        words
            .iter()
            .map(|w| {
                let t = Token::new(*w, pos);
                pos += w.chars().count() + 1;
                t
            })
            .collect()
    }

    #[test]
    fn test_one_word_per_token() {
        let toks = tokens(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        let words = build_words(&toks);
        assert_eq!(words.len(), toks.len());
        for (token, word) in toks.iter().zip(&words) {
            assert_eq!(word.text(), token.text());
            assert_eq!(word.position(), token.position());
            assert_eq!(word.context()[FOCUS_INDEX], token.text());
        }
    }

    #[test]
    fn test_middle_window() {
        let toks = tokens(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        let words = build_words(&toks);
        assert_eq!(words[5].context(), &["b", "c", "d", "e", "f", "g", "h", "i"].map(String::from));
        assert_eq!(words[5].before(), ["b", "c", "d", "e"]);
        assert_eq!(words[5].after(), ["g", "h", "i"]);
    }

    #[test]
    fn test_single_token_is_padded() {
        let words = build_words(&tokens(&["tbe"]));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].context(), &["", "", "", "", "tbe", "", "", ""].map(String::from));
    }

    #[test]
    fn test_boundaries_use_sentinel() {
        let words = build_words(&tokens(&["x", "y", "z"]));
        assert_eq!(words[0].context(), &["", "", "", "", "x", "y", "z", ""].map(String::from));
        assert_eq!(words[2].context(), &["", "", "x", "y", "z", "", "", ""].map(String::from));
    }

    #[test]
    fn test_empty_tokens_give_no_words() {
        assert!(build_words(&[]).is_empty());
    }

    #[test]
    fn test_from_context_rejects_wrong_size() {
        let err = Word::from_context(0, vec![String::new(); 7]).unwrap_err();
        assert!(matches!(err, DetectError::Configuration(_)));
        assert!(Word::from_context(0, vec![String::new(); 9]).is_err());
        assert!(Word::from_context(0, vec![String::new(); 8]).is_ok());
    }

    #[test]
    fn test_builder() {
        let word = ["", "", "the", "quick", "brown", "fox", "jumps", "over"]
            .iter()
            .fold(WordBuilder::new(10), |b, t| b.push(*t))
            .build()
            .unwrap();
        assert_eq!(word.text(), "brown");
        assert_eq!(word.position(), 10);

        let short = WordBuilder::new(0).push_token(None).push("a").build();
        assert!(short.is_err());
    }

    #[test]
    fn test_ngrams() {
        let toks = tokens(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let word = &build_words(&toks)[4];

        let trigram = word.ngram(3, 1).unwrap();
        assert_eq!(trigram.words, ["d", "e", "f"]);
        assert_eq!(trigram.focus(), "e");
        assert_eq!(trigram.to_string(), "d e f");

        assert_eq!(word.ngrams(1).unwrap().len(), 1);
        assert_eq!(word.ngrams(4).unwrap().len(), 4);
        // Tamanho 5 com foco no índice 0 exigiria quatro posições à direita
        assert_eq!(word.ngrams(5).unwrap().len(), 4);
        assert!(word.ngram(5, 0).is_err());
        assert!(word.ngrams(6).is_err());
        assert!(word.ngrams(0).is_err());
    }

    #[test]
    fn test_ngram_at_boundary() {
        let word = &build_words(&tokens(&["only"]))[0];
        let bigram = word.ngram(2, 0).unwrap();
        assert_eq!(bigram.words, ["only", ""]);
        assert!(bigram.touches_boundary());
    }

    #[test]
    fn test_display() {
        let word = &build_words(&tokens(&["a", "b"]))[0];
        assert_eq!(word.to_string(), "a <\"\",\"\",\"\",\"\",\"a\",\"b\",\"\",\"\">");
    }
}
