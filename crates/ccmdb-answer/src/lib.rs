//! ccmdb-answer
//!
//! Turns retrieved evidence plus a question into a structured prompt
//! and hands it to a generation model. The model itself is an external
//! collaborator behind the `Generator` trait; this crate only formats
//! and delegates.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use ccmdb_core::types::{Chunk, ChunkId};

pub const DEFAULT_TEMPLATE: &str = "\
You are a compliance assistant. Using only the provided context, answer the question below.
Cite document or control sources. If there are compliance gaps, identify them and suggest remediation.

Question: {question}

Context:
{context}

Answer:";

/// A prompt with `{question}` and `{context}` slots.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string() }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for slot in ["{question}", "{context}"] {
            if !template.contains(slot) {
                return Err(anyhow!("prompt template is missing the {slot} slot"));
            }
        }
        Ok(Self { template })
    }

    pub fn render(&self, question: &str, context: &str) -> String {
        self.template
            .replace("{question}", question)
            .replace("{context}", context)
    }
}

/// The external generation model.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Chunk ids whose text made it into the prompt context.
    pub sources: Vec<ChunkId>,
}

pub struct AnswerComposer<G: Generator> {
    template: PromptTemplate,
    generator: G,
}

impl<G: Generator> AnswerComposer<G> {
    pub fn new(template: PromptTemplate, generator: G) -> Self {
        Self { template, generator }
    }

    pub async fn compose(&self, question: &str, evidence: &[Chunk]) -> Result<Answer> {
        let context = build_context(evidence);
        let prompt = self.template.render(question, &context);
        let text = self.generator.generate(&prompt).await?;
        Ok(Answer {
            text,
            sources: evidence.iter().map(|c| c.id.clone()).collect(),
        })
    }
}

/// One citation line per evidence chunk, e.g.
/// `[pol-a:0] (NIST AC-2): User accounts must be reviewed quarterly.`
fn build_context(chunks: &[Chunk]) -> String {
    let mut lines = Vec::with_capacity(chunks.len());
    for c in chunks {
        let citation = match &c.meta.control_id {
            Some(control) => format!("[{}] ({} {})", c.id, c.meta.framework, control),
            None => format!("[{}] ({})", c.id, c.meta.framework),
        };
        lines.push(format!("{}: {}", citation, c.text));
    }
    lines.join("\n")
}
