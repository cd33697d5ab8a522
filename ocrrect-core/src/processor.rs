//! # Processadores de Segmentos
//!
//! Estágios opcionais em volta do segmentador, escolhidos por configuração
//! ([`ProcessorKind`]):
//!
//! - **Texto** ([`TextProcessor`]): roda antes da segmentação. [`LineConcat`] junta
//!   palavras quebradas por hífen no fim da linha (`bro-\nken` → `broken`).
//! - **Tokens** ([`SegmentProcessor`]): roda depois da segmentação, na ordem configurada.
//!   [`MultiPunctSplit`] separa sequências de pontuação (`;;` → `;`, `;`) e
//!   [`NonWordConcat`] funde tokens vizinhos fora do léxico num único token.
//!
//! ## Offsets
//!
//! Nenhum estágio desloca posições. [`LineConcat`] devolve um texto com o mesmo número
//! de caracteres da entrada (o hífen e a quebra de linha removidos reaparecem como
//! espaços depois da palavra juntada), então os offsets dos tokens continuam apontando
//! para o texto original. Os estágios de tokens calculam as posições a partir das
//! posições recebidas.
//!
//! ```rust
//! use ocrrect_core::processor::concat_broken_lines;
//! use ocrrect_core::Lexicon;
//!
//! let lexicon = Lexicon::from_words(["the", "fox"]);
//! let joined = concat_broken_lines("the bro-\nken fox", &lexicon);
//! assert_eq!(joined, "the broken   fox");
//! assert_eq!(joined.chars().count(), "the bro-\nken fox".chars().count());
//! ```

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lexicon::Lexicon;
use crate::segmenter::Token;
use crate::unit::{LocatedTextualUnit, TextualUnit};

/// Transforma o texto bruto antes da segmentação, preservando o número de caracteres.
pub trait TextProcessor: Send + Sync {
    fn name(&self) -> &'static str;
    fn process(&self, text: &str) -> String;
}

/// Reescreve a sequência de tokens produzida pelo segmentador.
pub trait SegmentProcessor: Send + Sync {
    fn name(&self) -> &'static str;
    fn process(&self, tokens: Vec<Token>) -> Vec<Token>;
}

fn broken_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([a-zA-Z]+)(-\s*)$").expect("broken word pattern is valid"))
}

fn first_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^(([a-zA-Z]*)\S*)(.*)$").expect("first word pattern is valid")
    })
}

// ============================================================================
// Junção de linhas
// ============================================================================

/// Junta palavras quebradas por hífen no fim de linha.
pub struct LineConcat {
    lexicon: Arc<Lexicon>,
}

impl LineConcat {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }
}

impl TextProcessor for LineConcat {
    fn name(&self) -> &'static str {
        "line_concat"
    }

    fn process(&self, text: &str) -> String {
        concat_broken_lines(text, &self.lexicon)
    }
}

/// Junta cada linha que termina em `letras-` com a primeira palavra da linha seguinte.
///
/// - Sem palavra no início da linha seguinte, o hífen é mantido.
/// - Se as duas metades estão no léxico, ou a forma hifenizada está, o hífen vai junto
///   com a segunda metade (`well-` + `known` → `well-known`).
/// - Caso contrário as metades são fundidas sem hífen (`bro-` + `ken` → `broken`).
///
/// Quebras de linha viram espaços. A saída tem sempre o mesmo número de caracteres
/// da entrada.
pub fn concat_broken_lines(text: &str, lexicon: &Lexicon) -> String {
    let mut out = String::with_capacity(text.len());
    // Primeira metade da palavra quebrada e quantos caracteres saíram da linha dela
    let mut pending: Option<(String, usize)> = None;

    for raw in text.split_inclusive('\n') {
        let body = match raw.strip_suffix('\n') {
            Some(body) => body.strip_suffix('\r').unwrap_or(body),
            None => raw,
        };
        let terminator = raw[body.len()..].chars().count();

        let mut line = match pending.take() {
            Some((head, removed)) => join_halves(&head, removed, body, lexicon),
            None => body.to_string(),
        };

        match broken_word(&line) {
            Some((head, cut, tail_chars)) => {
                line.truncate(cut);
                out.push_str(&line);
                pending = Some((head, tail_chars + terminator));
            }
            None => {
                out.push_str(&line);
                push_spaces(&mut out, terminator);
            }
        }
    }

    // Texto terminado no meio de uma palavra quebrada: o hífen volta
    if let Some((_, removed)) = pending {
        out.push('-');
        push_spaces(&mut out, removed - 1);
    }
    out
}

/// `(primeira metade, byte onde começa o hífen, caracteres do hífen até o fim)`.
fn broken_word(line: &str) -> Option<(String, usize, usize)> {
    let caps = broken_word_pattern().captures(line)?;
    let tail = caps.get(2)?;
    Some((caps[1].to_string(), tail.start(), tail.as_str().chars().count()))
}

fn join_halves(head: &str, removed: usize, body: &str, lexicon: &Lexicon) -> String {
    let Some(caps) = first_word_pattern().captures(body) else {
        return format!("-{}{body}", " ".repeat(removed - 1));
    };
    let word = caps.get(1).map_or("", |m| m.as_str());
    let letters = caps.get(2).map_or("", |m| m.as_str());
    let rest = caps.get(3).map_or("", |m| m.as_str());

    if word.is_empty() {
        return format!("-{}{body}", " ".repeat(removed - 1));
    }
    let hyphenated = format!("{head}-{letters}");
    if (lexicon.contains(head) && lexicon.contains(letters)) || lexicon.contains(&hyphenated) {
        format!("-{word}{}{rest}", " ".repeat(removed - 1))
    } else {
        format!("{word}{}{rest}", " ".repeat(removed))
    }
}

fn push_spaces(out: &mut String, count: usize) {
    out.extend(std::iter::repeat(' ').take(count));
}

// ============================================================================
// Separação de pontuação múltipla
// ============================================================================

/// Quebra tokens só de pontuação (`?!`, `;;`, `...`) em um token por caractere.
pub struct MultiPunctSplit;

impl SegmentProcessor for MultiPunctSplit {
    fn name(&self) -> &'static str {
        "multi_punct_split"
    }

    fn process(&self, tokens: Vec<Token>) -> Vec<Token> {
        split_multi_punct(tokens)
    }
}

pub fn split_multi_punct(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let text = token.text();
        let all_punct = text.chars().nth(1).is_some() && !text.chars().any(char::is_alphanumeric);
        if !all_punct {
            out.push(token);
            continue;
        }
        let start = token.position();
        out.extend(
            text.chars()
                .enumerate()
                .map(|(i, c)| Token::new(c.to_string(), start + i)),
        );
    }
    out
}

// ============================================================================
// Fusão de não-palavras
// ============================================================================

/// Funde sequências de tokens fora do léxico (`Tb e` → `Tb e` num só token).
pub struct NonWordConcat {
    lexicon: Arc<Lexicon>,
}

impl NonWordConcat {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }
}

impl SegmentProcessor for NonWordConcat {
    fn name(&self) -> &'static str {
        "non_word_concat"
    }

    fn process(&self, tokens: Vec<Token>) -> Vec<Token> {
        concat_non_words(tokens, &self.lexicon)
    }
}

/// Tokens vizinhos que não estão no léxico (nem em minúsculas) viram um só, na posição
/// do primeiro. O intervalo entre eles é preenchido com espaços, então o texto fundido
/// cobre exatamente o trecho original.
pub fn concat_non_words(tokens: Vec<Token>, lexicon: &Lexicon) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut pending: Option<Token> = None;

    for token in tokens {
        if is_known(lexicon, token.text()) {
            out.extend(pending.take());
            out.push(token);
            continue;
        }
        pending = Some(match pending.take() {
            Some(previous) => merge_tokens(previous, &token),
            None => token,
        });
    }
    out.extend(pending);
    out
}

fn is_known(lexicon: &Lexicon, text: &str) -> bool {
    lexicon.contains(text) || lexicon.contains(&text.to_lowercase())
}

fn merge_tokens(previous: Token, next: &Token) -> Token {
    let gap = next.position().saturating_sub(previous.end_position());
    let text = format!("{}{}{}", previous.text(), " ".repeat(gap), next.text());
    Token::new(text, previous.position())
}

// ============================================================================
// Configuração
// ============================================================================

/// Seleção de processadores por configuração.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessorKind {
    LineConcat,
    MultiPunctSplit,
    NonWordConcat,
}

/// Estágios montados: os de texto rodam antes do segmentador, os de tokens depois.
#[derive(Default)]
pub struct Processors {
    text: Vec<Box<dyn TextProcessor>>,
    segments: Vec<Box<dyn SegmentProcessor>>,
}

impl Processors {
    pub fn from_kinds(kinds: &[ProcessorKind], lexicon: &Arc<Lexicon>) -> Self {
        let mut processors = Self::default();
        for kind in kinds {
            match kind {
                ProcessorKind::LineConcat => processors
                    .text
                    .push(Box::new(LineConcat::new(Arc::clone(lexicon)))),
                ProcessorKind::MultiPunctSplit => processors.segments.push(Box::new(MultiPunctSplit)),
                ProcessorKind::NonWordConcat => processors
                    .segments
                    .push(Box::new(NonWordConcat::new(Arc::clone(lexicon)))),
            }
        }
        processors
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.segments.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.text
            .iter()
            .map(|p| p.name())
            .chain(self.segments.iter().map(|p| p.name()))
            .collect()
    }

    /// Aplica os estágios de texto.
    pub fn prepare<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut current = Cow::Borrowed(text);
        for processor in &self.text {
            current = Cow::Owned(processor.process(&current));
        }
        current
    }

    /// Aplica os estágios de tokens, na ordem configurada.
    pub fn refine(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        for processor in &self.segments {
            let before = tokens.len();
            tokens = processor.process(tokens);
            debug!(processor = processor.name(), before, after = tokens.len(), "tokens processed");
        }
        tokens
    }
}

impl std::fmt::Debug for Processors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
