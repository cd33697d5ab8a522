//! # Estimadores de Detecção
//!
//! Um estimador aprende, a partir de vetores de features rotulados, a decidir se cada
//! palavra é um erro de OCR. O pipeline só conhece o trait [`DetectionEstimator`].
//!
//! ## Ponte para Processo Externo
//!
//! [`ExternalEstimator`] delega treino e predição a um programa externo (por padrão,
//! `scripts/svm_detect.py` com scikit-learn). A troca de dados é feita por arquivos:
//!
//! ```text
//! <program> [args...] train   <features.tsv> <labels.txt> <artifact>
//! <program> [args...] predict <artifact> <features.tsv> <predictions.txt>
//! ```
//!
//! - `features.tsv`: uma linha por vetor, valores decimais separados por TAB, terminada em `\n`.
//! - `labels.txt`: um rótulo `1`/`0` por linha, alinhado às linhas de features.
//! - `predictions.txt`: um booleano por linha (`1`/`0`/`true`/`false`/`True`/`False`).
//!
//! Cada chamada usa um diretório temporário próprio (removido ao final), então
//! predições concorrentes na mesma instância não compartilham arquivos.
//! O artefato treinado vive em `model_path`, se configurado, ou num diretório
//! temporário que pertence à instância.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::errors::{DetectError, Result};
use crate::features::{FeatureVector, TrainingExample};

/// Nome do artefato quando `model_path` não é configurado.
pub const MODEL_FILE: &str = "detect.model";
const FEATURES_FILE: &str = "features.tsv";
const LABELS_FILE: &str = "labels.txt";
const PREDICTIONS_FILE: &str = "predictions.txt";
const STDOUT_FILE: &str = "stdout.log";
const STDERR_FILE: &str = "stderr.log";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Classificador binário "palavra errada?" sobre vetores de features.
///
/// Estado: não treinado → treinado. Treinar de novo substitui o modelo anterior.
pub trait DetectionEstimator: Send + Sync {
    fn train(&mut self, rows: &[FeatureVector], labels: &[bool]) -> Result<()>;

    /// Um veredito por linha, na ordem de entrada.
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<bool>>;

    /// Largura aprendida no treino; `None` enquanto não treinado.
    fn width(&self) -> Option<usize>;

    fn is_trained(&self) -> bool {
        self.width().is_some()
    }

    /// Treina a partir de exemplos rotulados.
    fn fit(&mut self, examples: &[TrainingExample]) -> Result<()> {
        let (rows, labels): (Vec<FeatureVector>, Vec<bool>) = examples
            .iter()
            .map(|example| (example.features.clone(), example.label))
            .unzip();
        self.train(&rows, &labels)
    }
}

/// Valida um conjunto de treino e devolve a largura comum dos vetores.
pub(crate) fn check_training_set(rows: &[FeatureVector], labels: &[bool]) -> Result<usize> {
    if rows.len() != labels.len() {
        return Err(DetectError::DimensionMismatch {
            expected: rows.len(),
            found: labels.len(),
        });
    }
    let Some(first) = rows.first() else {
        return Err(DetectError::configuration("training set is empty"));
    };
    let width = first.width();
    if width == 0 {
        return Err(DetectError::configuration("feature vectors are empty"));
    }
    check_rows(rows, width)?;
    Ok(width)
}

/// Todas as linhas têm a largura esperada.
pub(crate) fn check_rows(rows: &[FeatureVector], width: usize) -> Result<()> {
    match rows.iter().find(|r| r.width() != width) {
        Some(row) => Err(DetectError::DimensionMismatch {
            expected: width,
            found: row.width(),
        }),
        None => Ok(()),
    }
}

/// Configuração do processo externo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalConfig {
    /// Executável (ex: `/usr/bin/python3`).
    pub program: PathBuf,
    /// Argumentos fixos antes do modo (ex: o caminho do script).
    #[serde(default)]
    pub args: Vec<String>,
    /// Onde criar os diretórios temporários. `None` = diretório temporário do sistema.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    /// Caminho persistente do artefato treinado.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Tempo máximo por chamada, em milissegundos; o processo é encerrado ao expirar.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExternalConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            temp_dir: None,
            model_path: None,
            timeout_ms: None,
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Frações de milissegundo arredondam para cima, nunca para zero.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000).max(1);
        self.timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Metadados gravados ao lado do artefato (`<artifact>.meta.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub width: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Train,
    Predict,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Predict => "predict",
        }
    }

    fn error(&self, msg: impl Into<String>) -> DetectError {
        match self {
            Mode::Train => DetectError::training(msg),
            Mode::Predict => DetectError::prediction(msg),
        }
    }
}

/// Estimador que delega a um processo externo.
#[derive(Debug)]
pub struct ExternalEstimator {
    config: ExternalConfig,
    artifact: PathBuf,
    width: Option<usize>,
    /// Mantém vivo o diretório do artefato padrão.
    _bridge_dir: Option<TempDir>,
}

impl ExternalEstimator {
    pub fn new(config: ExternalConfig) -> Result<Self> {
        let (artifact, bridge_dir) = match &config.model_path {
            Some(path) => (path.clone(), None),
            None => {
                let dir = make_temp_dir(config.temp_dir.as_deref(), "ocrrect-bridge-")?;
                (dir.path().join(MODEL_FILE), Some(dir))
            }
        };
        Ok(Self {
            config,
            artifact,
            width: None,
            _bridge_dir: bridge_dir,
        })
    }

    /// Adota um artefato já treinado em `model_path`, lendo a largura dos metadados.
    pub fn load(config: ExternalConfig) -> Result<Self> {
        let artifact = config.model_path.clone().ok_or_else(|| {
            DetectError::configuration("loading a trained model requires model_path")
        })?;
        if !artifact.is_file() {
            return Err(DetectError::io(
                &artifact,
                io::Error::new(io::ErrorKind::NotFound, "model artifact not found"),
            ));
        }
        let sidecar = metadata_path(&artifact);
        let raw = fs::read_to_string(&sidecar).map_err(|e| DetectError::io(&sidecar, e))?;
        let metadata: ModelMetadata = serde_json::from_str(&raw)?;
        info!(artifact = %artifact.display(), width = metadata.width, "trained model loaded");

        Ok(Self {
            config,
            artifact,
            width: Some(metadata.width),
            _bridge_dir: None,
        })
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    fn call_dir(&self) -> Result<TempDir> {
        make_temp_dir(self.config.temp_dir.as_deref(), "ocrrect-call-")
    }

    fn run(&self, mode: Mode, operands: &[&Path], call_dir: &Path) -> Result<()> {
        let stdout_path = call_dir.join(STDOUT_FILE);
        let stderr_path = call_dir.join(STDERR_FILE);
        let stdout = File::create(&stdout_path).map_err(|e| DetectError::io(&stdout_path, e))?;
        let stderr = File::create(&stderr_path).map_err(|e| DetectError::io(&stderr_path, e))?;

        let program = &self.config.program;
        let mut command = Command::new(program);
        command
            .args(&self.config.args)
            .arg(mode.as_str())
            .args(operands)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        info!(mode = mode.as_str(), program = %program.display(), "launching external estimator");
        let started = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| mode.error(format!("failed to spawn '{}': {e}", program.display())))?;

        let status = match self.config.timeout() {
            None => child
                .wait()
                .map_err(|e| mode.error(format!("failed to wait for process: {e}")))?,
            Some(limit) => wait_with_timeout(&mut child, limit)
                .map_err(|e| mode.error(format!("failed to wait for process: {e}")))?
                .ok_or_else(|| mode.error(format!("process timed out after {limit:?}")))?,
        };

        if !status.success() {
            let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
            let stderr = stderr.trim();
            warn!(mode = mode.as_str(), %status, stderr, "external estimator failed");
            return Err(mode.error(format!("{status}: {stderr}")));
        }

        info!(
            mode = mode.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "external estimator finished"
        );
        Ok(())
    }
}

impl DetectionEstimator for ExternalEstimator {
    fn train(&mut self, rows: &[FeatureVector], labels: &[bool]) -> Result<()> {
        let width = check_training_set(rows, labels)?;
        let call_dir = self.call_dir()?;
        let features_path = call_dir.path().join(FEATURES_FILE);
        let labels_path = call_dir.path().join(LABELS_FILE);
        write_rows(&features_path, rows)?;
        write_labels(&labels_path, labels)?;

        if let Some(parent) = self.artifact.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DetectError::io(parent, e))?;
        }
        // Um treino que falha deixa o estimador sem modelo
        self.width = None;
        if self.artifact.exists() {
            fs::remove_file(&self.artifact).map_err(|e| DetectError::io(&self.artifact, e))?;
        }

        let artifact = self.artifact.clone();
        self.run(Mode::Train, &[&features_path, &labels_path, &artifact], call_dir.path())?;

        match fs::metadata(&artifact) {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                return Err(DetectError::training(format!(
                    "process did not produce a model at '{}'",
                    artifact.display()
                )))
            }
        }

        let sidecar = metadata_path(&artifact);
        let metadata = ModelMetadata {
            width,
            rows: rows.len(),
        };
        fs::write(&sidecar, serde_json::to_string_pretty(&metadata)?)
            .map_err(|e| DetectError::io(&sidecar, e))?;

        self.width = Some(width);
        info!(rows = rows.len(), width, "external estimator trained");
        Ok(())
    }

    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<bool>> {
        let width = self.width.ok_or(DetectError::NotTrained)?;
        check_rows(rows, width)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let call_dir = self.call_dir()?;
        let features_path = call_dir.path().join(FEATURES_FILE);
        let output_path = call_dir.path().join(PREDICTIONS_FILE);
        write_rows(&features_path, rows)?;

        self.run(
            Mode::Predict,
            &[&self.artifact, &features_path, &output_path],
            call_dir.path(),
        )?;

        let content = fs::read_to_string(&output_path)
            .map_err(|e| DetectError::prediction(format!("no predictions written: {e}")))?;
        let predictions = parse_predictions(&content)?;
        if predictions.len() != rows.len() {
            return Err(DetectError::prediction(format!(
                "expected {} predictions, got {}",
                rows.len(),
                predictions.len()
            )));
        }
        info!(rows = rows.len(), "external estimator predicted");
        Ok(predictions)
    }

    fn width(&self) -> Option<usize> {
        self.width
    }
}

fn make_temp_dir(base: Option<&Path>, prefix: &str) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match base {
        Some(dir) => builder.tempdir_in(dir).map_err(|e| DetectError::io(dir, e)),
        None => builder
            .tempdir()
            .map_err(|e| DetectError::io(std::env::temp_dir(), e)),
    }
}

/// `<artifact>.meta.json`
pub fn metadata_path(artifact: &Path) -> PathBuf {
    let mut path = artifact.as_os_str().to_owned();
    path.push(".meta.json");
    PathBuf::from(path)
}

fn wait_with_timeout(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            // O processo pode ter terminado entre try_wait e kill
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn write_rows(path: &Path, rows: &[FeatureVector]) -> Result<()> {
    let file = File::create(path).map_err(|e| DetectError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        let line = row
            .values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(out, "{line}").map_err(|e| DetectError::io(path, e))?;
    }
    out.flush().map_err(|e| DetectError::io(path, e))
}

fn write_labels(path: &Path, labels: &[bool]) -> Result<()> {
    let file = File::create(path).map_err(|e| DetectError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for label in labels {
        writeln!(out, "{}", if *label { 1 } else { 0 }).map_err(|e| DetectError::io(path, e))?;
    }
    out.flush().map_err(|e| DetectError::io(path, e))
}

/// Um booleano por linha, sem espaços nem linhas em branco; qualquer outro
/// conteúdo é erro. Só o `\r` de um final `\r\n` é removido.
fn parse_predictions(content: &str) -> Result<Vec<bool>> {
    content
        .lines()
        .enumerate()
        .map(|(n, line)| match line.strip_suffix('\r').unwrap_or(line) {
            "1" | "true" | "True" => Ok(true),
            "0" | "false" | "False" => Ok(false),
            other => Err(DetectError::prediction(format!(
                "line {}: {other:?} is not a boolean",
                n + 1
            ))),
        })
        .collect()
}
