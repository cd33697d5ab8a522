//! # Léxico
//!
//! Conjunto imutável de palavras válidas, consultado pelas features de validade.
//! A consulta é O(1) esperado (`HashSet`).
//!
//! ## Fontes
//!
//! Arquivos de texto simples, uma entrada por linha. Vários arquivos são unidos;
//! `\r` final é removido e linhas em branco são ignoradas.
//!
//! ## Política de Caixa
//!
//! - [`CasePolicy::Exact`] (padrão): `"The"` e `"the"` são entradas distintas.
//! - [`CasePolicy::Lowercase`]: entradas e consultas são convertidas para minúsculas.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{DetectError, Result};

/// Normalização aplicada a entradas e consultas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePolicy {
    Exact,
    Lowercase,
}

impl Default for CasePolicy {
    fn default() -> Self {
        CasePolicy::Exact
    }
}

impl CasePolicy {
    fn normalize<'a>(&self, word: &'a str) -> Cow<'a, str> {
        match self {
            CasePolicy::Exact => Cow::Borrowed(word),
            CasePolicy::Lowercase => Cow::Owned(word.to_lowercase()),
        }
    }
}

/// Conjunto de palavras conhecidas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexicon {
    words: HashSet<String>,
    case_policy: CasePolicy,
    /// Aceita também tokens formados só por dígitos.
    numeric_words: bool,
}

impl Lexicon {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_words_with_policy(words, CasePolicy::default())
    }

    pub fn from_words_with_policy<I, S>(words: I, case_policy: CasePolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words = words
            .into_iter()
            .map(|w| {
                let w: String = w.into();
                match case_policy {
                    CasePolicy::Exact => w,
                    CasePolicy::Lowercase => w.to_lowercase(),
                }
            })
            .collect();
        Self {
            words,
            case_policy,
            numeric_words: false,
        }
    }

    /// União das linhas de todos os arquivos.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        Self::from_paths_with_policy(paths, CasePolicy::default())
    }

    pub fn from_paths_with_policy<P: AsRef<Path>>(paths: &[P], case_policy: CasePolicy) -> Result<Self> {
        let mut entries = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let content =
                std::fs::read_to_string(path).map_err(|e| DetectError::io(path, e))?;
            let before = entries.len();
            entries.extend(
                content
                    .lines()
                    .map(|line| line.strip_suffix('\r').unwrap_or(line))
                    .filter(|line| !line.trim().is_empty())
                    .map(str::to_string),
            );
            debug!(path = %path.display(), entries = entries.len() - before, "lexicon file loaded");
        }
        Ok(Self::from_words_with_policy(entries, case_policy))
    }

    /// Versão que também aceita números: palavras só de caracteres numéricos Unicode
    /// ([`char::is_numeric`]), como `"1984"`, `"١٩٨٤"` ou `"½"`.
    pub fn with_numeric_words(mut self) -> Self {
        self.numeric_words = true;
        self
    }

    /// União com outro léxico. A política de caixa e a aceitação de números de `self` prevalecem;
    /// as entradas de `other` são renormalizadas.
    pub fn merge(mut self, other: &Lexicon) -> Self {
        let policy = self.case_policy;
        self.words
            .extend(other.words.iter().map(|w| policy.normalize(w).into_owned()));
        self.numeric_words |= other.numeric_words;
        self
    }

    pub fn contains(&self, word: &str) -> bool {
        if self.numeric_words && !word.is_empty() && word.chars().all(|c| c.is_numeric()) {
            return true;
        }
        self.words.contains(&*self.case_policy.normalize(word))
    }

    pub fn case_policy(&self) -> CasePolicy {
        self.case_policy
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_words() {
        let lexicon = Lexicon::from_words(["the", "quick", "fox"]);
        assert!(lexicon.contains("quick"));
        assert!(!lexicon.contains("qnick"));
        assert!(!lexicon.contains("The"));
        assert_eq!(lexicon.len(), 3);
    }

    #[test]
    fn test_from_paths_is_union_of_lines() {
        let mut first = tempfile::NamedTempFile::new().unwrap();
        write!(first, "apple\r\nbanana\n\n   \ncherry").unwrap();
        let mut second = tempfile::NamedTempFile::new().unwrap();
        writeln!(second, "banana\ndate").unwrap();

        let lexicon = Lexicon::from_paths(&[first.path(), second.path()]).unwrap();
        for word in ["apple", "banana", "cherry", "date"] {
            assert!(lexicon.contains(word), "faltando {word}");
        }
        assert!(!lexicon.contains(""));
        assert!(!lexicon.contains("apple\r"));
        assert_eq!(lexicon.len(), 4);
    }

    #[test]
    fn test_unreadable_path_fails_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let err = Lexicon::from_paths(&[missing]).unwrap_err();
        assert!(matches!(err, DetectError::Io { .. }));
    }

    #[test]
    fn test_lowercase_policy() {
        let lexicon = Lexicon::from_words_with_policy(["The", "fox"], CasePolicy::Lowercase);
        assert!(lexicon.contains("the"));
        assert!(lexicon.contains("THE"));
        assert!(lexicon.contains("Fox"));
    }

    #[test]
    fn test_numeric_words_and_merge() {
        let base = Lexicon::from_words(["one"]);
        assert!(!base.contains("1984"));

        let numeric = base.clone().with_numeric_words();
        assert!(numeric.contains("1984"));
        assert!(!numeric.contains("19a4"));
        assert!(!numeric.contains(""));
        // Dígitos de qualquer sistema numérico Unicode
        assert!(numeric.contains("\u{661}\u{669}\u{668}\u{664}"));
        assert!(numeric.contains("\u{96a}\u{968}"));
        assert!(numeric.contains("\u{bd}"));
        assert!(!base.contains("\u{661}\u{669}\u{668}\u{664}"));

        let merged = base.merge(&Lexicon::from_words(["two"]));
        assert!(merged.contains("one"));
        assert!(merged.contains("two"));
    }
}
