//! # Segmentador de Texto OCR
//!
//! Divide o texto bruto em tokens posicionados. Cada token guarda o offset (em caracteres)
//! do seu primeiro caractere no texto original, o que permite recuperar o trecho exato
//! mesmo depois de o token virar uma janela de contexto.
//!
//! ## Modos de Segmentação
//!
//! - **Whitespace**: quebra apenas em sequências de espaço em branco, sem normalização.
//! - **PennTreebank**: regras do Penn Treebank para inglês (pontuação separada das palavras,
//!   contrações, ponto final, reticências). Os tokens são gerados primeiro e os offsets são
//!   recuperados depois, procurando cada token no texto a partir do fim do anterior.
//! - **Hyphenated**: PennTreebank seguido da separação de hífens (`well-known` →
//!   `well`, `-`, `known`), útil quando o léxico é de unigramas sem hífen.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use ocrrect_core::segmenter::{segment_with_mode, SegmenterMode};
//! use ocrrect_core::unit::{LocatedTextualUnit, TextualUnit};
//!
//! let tokens = segment_with_mode("Hello, world!", SegmenterMode::PennTreebank).unwrap();
//! let texts: Vec<&str> = tokens.iter().map(|t| t.text()).collect();
//! assert_eq!(texts, ["Hello", ",", "world", "!"]);
//! assert_eq!(tokens[2].position(), 7);
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{DetectError, Result};
use crate::unit::{LocatedTextualUnit, Text, TextualUnit};

/// Um token extraído do texto original.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    text: String,
    /// Offset em caracteres do início do token no texto original.
    position: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, position: usize) -> Self {
        Self {
            text: text.into(),
            position,
        }
    }
}

impl TextualUnit for Token {
    fn text(&self) -> &str {
        &self.text
    }
}

impl LocatedTextualUnit for Token {
    fn position(&self) -> usize {
        self.position
    }
}

/// Estratégias de segmentação disponíveis, escolhidas por configuração.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmenterMode {
    /// Quebra em espaços em branco, preserva o texto de cada token.
    Whitespace,
    /// Regras do Penn Treebank para inglês.
    PennTreebank,
    /// Penn Treebank com hífens separados em tokens próprios.
    Hyphenated,
}

impl Default for SegmenterMode {
    fn default() -> Self {
        SegmenterMode::PennTreebank
    }
}

/// Capacidade de transformar um [`Text`] em uma sequência ordenada de tokens.
///
/// Implementações devem ser determinísticas e sem efeitos colaterais: nunca reordenam
/// tokens e nunca descartam tokens não vazios.
pub trait WordSegmenter: Send + Sync {
    fn segment(&self, text: &Text) -> Result<Vec<Token>>;
}

impl WordSegmenter for SegmenterMode {
    fn segment(&self, text: &Text) -> Result<Vec<Token>> {
        segment_with_mode(text.text(), *self)
    }
}

/// Abreviações que mantêm o ponto final colado ao token.
const ABBREVIATIONS: &[&str] = &[
    "Mr", "Mrs", "Ms", "Dr", "Prof", "Sr", "Jr", "St", "Mt", "Rev", "Gen", "Col", "Capt",
    "Lt", "Sgt", "Gov", "Sen", "Rep", "Inc", "Ltd", "Co", "Corp", "Bros", "vs", "etc",
    "Jan", "Feb", "Mar", "Apr", "Jun", "Jul", "Aug", "Sep", "Sept", "Oct", "Nov", "Dec",
    "Fig", "Vol", "pp", "cf", "al",
];

/// Pontuação que abre um token (destacada do início).
const OPENING: &[&str] = &["``", "\"", "'", "`", "(", "[", "{", "<", "$", "#", "@", "\u{201C}", "\u{2018}"];

/// Pontuação que fecha um token (destacada do fim), exceto o ponto, tratado à parte.
const CLOSING: &[char] = &[
    '"', '\'', ')', ']', '}', '>', ',', ';', ':', '!', '?', '%', '\u{201D}', '\u{2019}',
];

/// Palavras que o Treebank divide em duas partes de três letras + resto.
const SPLIT_WORDS: &[&str] = &["cannot", "gonna", "gotta", "wanna"];

fn contraction_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(.+?)(n['\u{2019}]t|['\u{2019}](?:s|m|d|ll|re|ve))$")
            .expect("contraction pattern is valid")
    })
}

fn initials_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\p{L}(\.\p{L})+$").expect("initials pattern is valid"))
}

fn hyphen_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^-]+|-").expect("hyphen pattern is valid"))
}

/// Segmenta com o modo padrão (Penn Treebank).
pub fn segment(text: &str) -> Result<Vec<Token>> {
    segment_with_mode(text, SegmenterMode::default())
}

/// Segmenta um texto com o modo especificado.
pub fn segment_with_mode(text: &str, mode: SegmenterMode) -> Result<Vec<Token>> {
    let tokens = match mode {
        SegmenterMode::Whitespace => segment_whitespace(text),
        SegmenterMode::PennTreebank => align_tokens(text, penn_treebank_pieces(text))?,
        SegmenterMode::Hyphenated => split_hyphens(align_tokens(text, penn_treebank_pieces(text))?),
    };
    debug!(?mode, tokens = tokens.len(), "text segmented");
    Ok(tokens)
}

fn segment_whitespace(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (pos, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            flush_token(&mut tokens, &mut current, start);
        } else {
            if current.is_empty() {
                start = pos;
            }
            current.push(ch);
        }
    }
    flush_token(&mut tokens, &mut current, start);

    tokens
}

/// Fecha o token acumulado e adiciona à lista (se não vazio)
fn flush_token(tokens: &mut Vec<Token>, text: &mut String, start: usize) {
    if !text.is_empty() {
        tokens.push(Token::new(std::mem::take(text), start));
    }
}

/// Gera os textos dos tokens segundo as regras do Penn Treebank, sem offsets.
///
/// Todo texto gerado é um trecho contíguo do original, o que garante que
/// [`align_tokens`] sempre o encontra.
pub fn penn_treebank_pieces(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut chunks = text.split_whitespace().peekable();
    while let Some(chunk) = chunks.next() {
        split_chunk(chunk, chunks.peek().is_some(), &mut pieces);
    }
    pieces
}

/// `has_next`: existe outro trecho depois deste (decide se `X.` é uma inicial).
fn split_chunk(chunk: &str, has_next: bool, out: &mut Vec<String>) {
    let mut rest = chunk;

    // Pontuação de abertura
    while let Some(prefix) = OPENING
        .iter()
        .find(|p| rest.starts_with(**p) && rest.len() > p.len())
    {
        out.push(prefix.to_string());
        rest = &rest[prefix.len()..];
    }

    // Pontuação de fechamento, acumulada de trás para frente
    let mut trailing: Vec<&str> = Vec::new();
    loop {
        // Reticências ou travessão isolados ficam inteiros
        if rest.chars().nth(1).is_none() || rest == "..." || rest == "--" {
            break;
        }
        if let Some(suffix) = ["...", "--", "''"]
            .iter()
            .find(|s| rest.ends_with(**s) && rest.len() > s.len())
        {
            trailing.push(&rest[rest.len() - suffix.len()..]);
            rest = &rest[..rest.len() - suffix.len()];
            continue;
        }
        let Some(last) = rest.chars().next_back() else {
            break;
        };
        let cut = rest.len() - last.len_utf8();
        let peel = if last == '.' {
            !is_abbreviation(&rest[..cut], has_next)
        } else {
            CLOSING.contains(&last)
        };
        if !peel {
            break;
        }
        trailing.push(&rest[cut..]);
        rest = &rest[..cut];
    }

    split_core(rest, out);
    out.extend(trailing.into_iter().rev().map(str::to_string));
}

/// Uma letra maiúscula só é inicial (`J. Smith`) se houver texto depois;
/// no fim (`so am I.`) o ponto encerra a frase.
fn is_abbreviation(core: &str, has_next: bool) -> bool {
    if ABBREVIATIONS.contains(&core) || initials_pattern().is_match(core) {
        return true;
    }
    let mut chars = core.chars();
    has_next && matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase())
}

/// Separa reticências, travessões duplos e pontuação interna do núcleo do token.
fn split_core(core: &str, out: &mut Vec<String>) {
    let chars: Vec<(usize, char)> = core.char_indices().collect();
    let mut word_start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (byte_pos, ch) = chars[i];
        let tail = &core[byte_pos..];
        let between_digits = i > 0
            && chars[i - 1].1.is_ascii_digit()
            && chars.get(i + 1).map(|(_, c)| c.is_ascii_digit()).unwrap_or(false);

        let sep_len = if tail.starts_with("...") {
            3
        } else if tail.starts_with("--") {
            2
        } else if matches!(ch, ';' | '!' | '?') || (matches!(ch, ',' | ':') && !between_digits) {
            ch.len_utf8()
        } else {
            0
        };

        if sep_len == 0 {
            i += 1;
            continue;
        }
        push_word(&core[word_start..byte_pos], out);
        out.push(core[byte_pos..byte_pos + sep_len].to_string());
        word_start = byte_pos + sep_len;
        while i < chars.len() && chars[i].0 < word_start {
            i += 1;
        }
    }
    push_word(&core[word_start..], out);
}

/// Adiciona uma palavra, separando contrações ("don't" → "do", "n't").
fn push_word(word: &str, out: &mut Vec<String>) {
    if word.is_empty() {
        return;
    }
    if SPLIT_WORDS.contains(&word.to_lowercase().as_str()) {
        out.push(word[..3].to_string());
        out.push(word[3..].to_string());
        return;
    }
    if let Some(caps) = contraction_pattern().captures(word) {
        out.push(caps[1].to_string());
        out.push(caps[2].to_string());
        return;
    }
    out.push(word.to_string());
}

/// Recupera a posição de cada token procurando-o no texto, em ordem.
///
/// Cada busca começa no fim do token anterior, então substrings repetidas resolvem
/// para ocorrências sucessivas, nunca sempre para a primeira.
pub fn align_tokens(text: &str, pieces: Vec<String>) -> Result<Vec<Token>> {
    let mut tokens = Vec::with_capacity(pieces.len());
    let mut byte_cursor = 0;
    let mut char_cursor = 0;

    for piece in pieces {
        if piece.is_empty() {
            continue;
        }
        let found = text[byte_cursor..].find(piece.as_str()).ok_or_else(|| {
            DetectError::segmentation(format!(
                "token '{piece}' not found after character {char_cursor}"
            ))
        })?;
        let start_byte = byte_cursor + found;
        char_cursor += text[byte_cursor..start_byte].chars().count();
        byte_cursor = start_byte + piece.len();

        let len = piece.chars().count();
        tokens.push(Token::new(piece, char_cursor));
        char_cursor += len;
    }

    Ok(tokens)
}

fn split_hyphens(tokens: Vec<Token>) -> Vec<Token> {
    let mut split = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !token.text.contains('-') {
            split.push(token);
            continue;
        }
        for m in hyphen_pattern().find_iter(&token.text) {
            let offset = token.text[..m.start()].chars().count();
            split.push(Token::new(m.as_str(), token.position + offset));
        }
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text()).collect()
    }

    /// O trecho do texto original em `[position, position + len)` é o próprio token.
    fn assert_offsets(text: &str, tokens: &[Token]) {
        let chars: Vec<char> = text.chars().collect();
        for token in tokens {
            let span: String = chars[token.position()..token.end_position()].iter().collect();
            assert_eq!(span, token.text(), "offset incorreto para {:?}", token);
        }
    }

    #[test]
    fn test_whitespace_basic() {
        let tokens = segment_with_mode("a b-c  d", SegmenterMode::Whitespace).unwrap();
        assert_eq!(texts(&tokens), ["a", "b-c", "d"]);
        assert_eq!(tokens[1].position(), 2);
        assert_eq!(tokens[2].position(), 7);
    }

    #[test]
    fn test_empty_input() {
        for mode in [
            SegmenterMode::Whitespace,
            SegmenterMode::PennTreebank,
            SegmenterMode::Hyphenated,
        ] {
            assert!(segment_with_mode("", mode).unwrap().is_empty());
            assert!(segment_with_mode(" \n\t ", mode).unwrap().is_empty());
        }
    }

    #[test]
    fn test_no_whitespace_single_token() {
        let tokens = segment_with_mode("tbe", SegmenterMode::Whitespace).unwrap();
        assert_eq!(tokens, vec![Token::new("tbe", 0)]);
    }

    #[test]
    fn test_offsets_are_character_based() {
        let text = "café\tau  lait\nnoir";
        let tokens = segment_with_mode(text, SegmenterMode::Whitespace).unwrap();
        assert_eq!(texts(&tokens), ["café", "au", "lait", "noir"]);
        assert_eq!(tokens[1].position(), 5);
        assert_offsets(text, &tokens);
    }

    #[test]
    fn test_penn_treebank_hello_world() {
        let tokens = segment("Hello, world!").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::new("Hello", 0),
                Token::new(",", 5),
                Token::new("world", 7),
                Token::new("!", 12),
            ]
        );
    }

    #[test]
    fn test_penn_treebank_contractions() {
        let tokens = segment("I don't know, they'll see. We cannot stop.").unwrap();
        assert_eq!(
            texts(&tokens),
            ["I", "do", "n't", "know", ",", "they", "'ll", "see", ".", "We", "can", "not", "stop", "."]
        );
        assert_offsets("I don't know, they'll see. We cannot stop.", &tokens);
    }

    #[test]
    fn test_penn_treebank_abbreviations_and_numbers() {
        let text = "Mr. Smith paid $1,000.50 in the U.S. yesterday.";
        let tokens = segment(text).unwrap();
        assert_eq!(
            texts(&tokens),
            ["Mr.", "Smith", "paid", "$", "1,000.50", "in", "the", "U.S.", "yesterday", "."]
        );
        assert_offsets(text, &tokens);
    }

    #[test]
    fn test_penn_treebank_quotes_and_brackets() {
        let text = "He said: \"no, no.\" (maybe...)";
        let tokens = segment(text).unwrap();
        assert_eq!(
            texts(&tokens),
            ["He", "said", ":", "\"", "no", ",", "no", ".", "\"", "(", "maybe", "...", ")"]
        );
        assert_offsets(text, &tokens);
    }

    #[test]
    fn test_penn_treebank_standalone_ellipsis() {
        let tokens = segment("wait ... now").unwrap();
        assert_eq!(
            tokens,
            vec![Token::new("wait", 0), Token::new("...", 5), Token::new("now", 9)]
        );
        assert_eq!(texts(&segment("(...) -- ok").unwrap()), ["(", "...", ")", "--", "ok"]);
    }

    #[test]
    fn test_penn_treebank_single_capital_initial() {
        assert_eq!(texts(&segment("so am I.").unwrap()), ["so", "am", "I", "."]);
        assert_eq!(texts(&segment("J. Smith wrote it").unwrap()), ["J.", "Smith", "wrote", "it"]);
        assert_eq!(texts(&segment("Plan B.").unwrap()), ["Plan", "B", "."]);
        // Iniciais pontuadas continuam inteiras mesmo no fim
        assert_eq!(texts(&segment("in the U.S.").unwrap()), ["in", "the", "U.S."]);
    }

    #[test]
    fn test_repeated_substrings_resolve_in_order() {
        let text = "the theory of the the";
        let tokens = segment(text).unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position()).collect();
        assert_eq!(positions, [0, 4, 11, 14, 18]);
        assert_offsets(text, &tokens);
    }

    #[test]
    fn test_noisy_ocr_keeps_every_character_run() {
        let text = "Tbe qnick brown--fox jumpcd ovcr the 1azy d0g;;";
        let tokens = segment(text).unwrap();
        assert_offsets(text, &tokens);
        assert!(texts(&tokens).contains(&"--"));
        assert!(texts(&tokens).contains(&"d0g"));
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let text = "It's 10:30 -- the \u{201C}end\u{201D}, isn't it?";
        for mode in [
            SegmenterMode::Whitespace,
            SegmenterMode::PennTreebank,
            SegmenterMode::Hyphenated,
        ] {
            let first = segment_with_mode(text, mode).unwrap();
            let second = segment_with_mode(text, mode).unwrap();
            assert_eq!(first, second);
            assert_offsets(text, &first);
        }
    }

    #[test]
    fn test_hyphenated_mode() {
        let tokens = segment_with_mode("a well-known fact", SegmenterMode::Hyphenated).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::new("a", 0),
                Token::new("well", 2),
                Token::new("-", 6),
                Token::new("known", 7),
                Token::new("fact", 13),
            ]
        );
    }

    #[test]
    fn test_align_reports_missing_token() {
        let err = align_tokens("abc", vec!["abc".into(), "d".into()]).unwrap_err();
        assert!(matches!(err, DetectError::Segmentation(_)));
    }

    #[test]
    fn test_segmenter_mode_from_config() {
        let mode: SegmenterMode = serde_json::from_str("\"penn_treebank\"").unwrap();
        assert_eq!(mode, SegmenterMode::PennTreebank);
        assert_eq!(SegmenterMode::default(), SegmenterMode::PennTreebank);

        let tokens = SegmenterMode::Whitespace.segment(&Text::new("x y")).unwrap();
        assert_eq!(tokens.len(), 2);
    }
}
