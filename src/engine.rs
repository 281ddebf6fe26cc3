//! Explanation facade.
//!
//! [`Explainer`] tries an external [`ExplainEngine`] first when one is
//! configured and available, and falls back to the rule-based pipeline when
//! the call fails, times out, or answers with nothing usable. Failures are
//! returned as data in [`Explanation`], never raised.
//!
//! ```text
//! ATTEMPT_EXTERNAL ──(error | timeout | empty | unparseable)──▶ RULE_FALLBACK
//!        │                                                          │
//!        └──────────── ok ──▶ engine=LLM          engine=RULE ◀─────┘
//! ```

use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::process::{Command, Stdio};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{EngineError, SplainResult};
use crate::{parser, render};

/// Default model identifier reported in metadata.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default bound on one external call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An external explanation engine.
pub trait ExplainEngine: Send + Sync {
    /// Whether the engine can be called at all.
    fn is_available(&self) -> bool;

    /// Produce a Markdown explanation for the given prompt.
    fn explain(&self, prompt: &str) -> Result<String, EngineError>;

    /// Like [`explain`](Self::explain), bounded by `timeout`. Engines that
    /// hold an outside resource override this to release it when the bound
    /// is hit; the facade abandons everything else after `timeout`.
    fn explain_within(&self, prompt: &str, timeout: Duration) -> Result<String, EngineError> {
        let _ = timeout;
        self.explain(prompt)
    }
}

/// Which path produced the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineKind {
    Rule,
    Llm,
    Error,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Rule => write!(f, "RULE"),
            EngineKind::Llm => write!(f, "LLM"),
            EngineKind::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of one explanation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub engine: EngineKind,
    pub model: String,
    /// Why the external attempt failed, or why both paths failed.
    pub error: Option<String>,
    pub document: String,
}

/// The explanation facade.
#[derive(Clone)]
pub struct Explainer {
    engine: Option<Arc<dyn ExplainEngine>>,
    model: String,
    timeout: Duration,
    prefer_external: bool,
    include_raw_query: bool,
}

impl Default for Explainer {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl Explainer {
    /// A rule-only explainer reporting the given model identifier.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            engine: None,
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            prefer_external: true,
            include_raw_query: true,
        }
    }

    /// Build from configuration. A command engine is attached only when
    /// `engine.enabled` is set and a command is configured.
    pub fn from_config(config: &Config) -> Self {
        let mut explainer = Self::new(config.engine.model.clone())
            .timeout(Duration::from_secs(config.engine.timeout_secs))
            .include_raw_query(config.output.include_raw_query);
        if config.engine.enabled {
            match CommandEngine::from_argv(&config.engine.command) {
                Some(engine) => explainer = explainer.with_engine(Arc::new(engine)),
                None => tracing::warn!("engine enabled but no command configured"),
            }
        }
        explainer
    }

    pub fn with_engine(mut self, engine: Arc<dyn ExplainEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// When false, the rule path is used even if an engine is configured.
    pub fn prefer_external(mut self, prefer: bool) -> Self {
        self.prefer_external = prefer;
        self
    }

    pub fn include_raw_query(mut self, include: bool) -> Self {
        self.include_raw_query = include;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Explain a query. Always returns a document.
    pub fn explain(&self, text: &str) -> Explanation {
        let mut error = None;

        if let Some(engine) = self.external() {
            tracing::info!(model = %self.model, "trying external engine");
            match self.attempt(engine, text) {
                Ok(document) => return self.finish(EngineKind::Llm, text, &document, None),
                Err(e) => {
                    tracing::warn!(error = %e, "external engine failed, using rules");
                    error = Some(e.to_string());
                }
            }
        }

        match explain_rules(text) {
            Ok(document) => self.finish(EngineKind::Rule, text, &document, error),
            Err(e) => {
                let message = match error {
                    Some(prev) => format!("{}; rule-based rendering failed: {}", prev, e),
                    None => format!("rule-based rendering failed: {}", e),
                };
                tracing::error!(%message, "no explanation produced");
                let notice = format!(
                    "### Explanation Failed\n- No explanation could be produced: {}\n",
                    message
                );
                self.finish(EngineKind::Error, text, &notice, Some(message))
            }
        }
    }

    /// Explain a query and keep only the document.
    pub fn explain_markdown(&self, text: &str) -> String {
        self.explain(text).document
    }

    fn external(&self) -> Option<&Arc<dyn ExplainEngine>> {
        if !self.prefer_external {
            return None;
        }
        self.engine.as_ref().filter(|e| e.is_available())
    }

    /// One bounded call; no retry.
    fn attempt(&self, engine: &Arc<dyn ExplainEngine>, text: &str) -> Result<String, EngineError> {
        let prompt = build_prompt(text);
        let engine = Arc::clone(engine);
        let timeout = self.timeout;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(engine.explain_within(&prompt, timeout));
        });

        let out = match rx.recv_timeout(timeout) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(EngineError::Timeout(timeout));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(EngineError::Failed("engine exited without a response".into()));
            }
        };

        let out = out.trim();
        if out.is_empty() {
            Err(EngineError::EmptyResponse)
        } else if !out.contains("### ") {
            Err(EngineError::Unparseable)
        } else {
            Ok(out.to_string())
        }
    }

    fn finish(
        &self,
        engine: EngineKind,
        text: &str,
        body: &str,
        error: Option<String>,
    ) -> Explanation {
        let mut document =
            render::metadata_header(&engine.to_string(), &self.model, error.as_deref());
        if self.include_raw_query {
            document.push_str(&render::input_query_block(text));
        }
        document.push_str(body);

        Explanation {
            engine,
            model: self.model.clone(),
            error,
            document,
        }
    }
}

/// The rule-based document, without metadata or the input block.
pub fn explain_rules(text: &str) -> SplainResult<String> {
    Ok(render::render(&parser::parse(text), text)?)
}

const PROMPT_PREAMBLE: &str = "You explain and review log search queries. \
Never execute the query. Analyse its structure and write Markdown with exactly \
the sections below, in this order, with these headings. Do not guess: mark \
anything you cannot determine as \"uncertain\".";

/// Prompt sent to the external engine, built from the same section contract
/// as the rule-based renderer.
pub fn build_prompt(text: &str) -> String {
    let mut prompt = format!(
        "{}\n\nQuery:\n```spl\n{}\n```\n\nRequired output:\n",
        PROMPT_PREAMBLE, text
    );
    for heading in render::SECTIONS {
        prompt.push_str(&format!("### {}\n- ...\n\n", heading));
    }
    prompt
}

/// Engine backed by a local program: the prompt goes to stdin, the
/// explanation comes back on stdout.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `["llm", "-m", "gpt-4o-mini"]` style argv. Empty argv yields `None`.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl ExplainEngine for CommandEngine {
    fn is_available(&self) -> bool {
        !self.program.is_empty()
    }

    fn explain(&self, prompt: &str) -> Result<String, EngineError> {
        self.explain_within(prompt, DEFAULT_TIMEOUT)
    }

    /// Runs the program, killing it once `timeout` elapses.
    fn explain_within(&self, prompt: &str, timeout: Duration) -> Result<String, EngineError> {
        if self.program.is_empty() {
            return Err(EngineError::Unavailable("no command configured".into()));
        }

        let deadline = Instant::now() + timeout;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Io(format!("{}: {}", self.program, e)))?;

        // Pipes are serviced on their own threads; the deadline loop never
        // blocks on them.
        let stdin = child.stdin.take();
        let prompt = prompt.to_owned();
        let writer = thread::spawn(move || match stdin {
            Some(mut pipe) => pipe.write_all(prompt.as_bytes()),
            None => Ok(()),
        });
        let stdout = child.stdout.take();
        let stdout = thread::spawn(move || drain(stdout));
        let stderr = child.stderr.take();
        let stderr = thread::spawn(move || drain(stderr));

        let status = loop {
            let polled = child
                .try_wait()
                .map_err(|e| EngineError::Io(e.to_string()))?;
            match polled {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(program = %self.program, "engine command killed after timeout");
                    return Err(EngineError::Timeout(timeout));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        match writer.join() {
            Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => {
                return Err(EngineError::Io(e.to_string()));
            }
            _ => {}
        }
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            return Err(EngineError::Failed(if stderr.is_empty() {
                status.to_string()
            } else {
                stderr
            }));
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}
