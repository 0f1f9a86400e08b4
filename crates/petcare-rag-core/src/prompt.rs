//! Grounded prompt assembly.
//!
//! Retrieved chunks are joined into one context block (rank order, blank
//! line between chunks) and rendered with the question into a
//! [`PromptTemplate`]. When the rendered prompt would exceed the provider's
//! input limit, the lowest-ranked chunks are dropped first.

use thiserror::Error;

use crate::models::Chunk;

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUESTION_PLACEHOLDER: &str = "{question}";

/// Built-in template. Instructs the model to answer only from the context
/// and to say so when the context does not cover the question.
pub const DEFAULT_TEMPLATE: &str = "\
You are a warm, friendly pet-care assistant who talks like a fellow animal lover.
- Use simple, everyday language and avoid heavy jargon.
- Base your answer on the information in the Context section below.
- If the context does not contain enough information to answer, say plainly that \
this information is not available yet and suggest asking a veterinarian. Do not make up facts.
- Remind the owner that your advice is general guidance and a veterinarian visit is always best.

Context:
{context}

Question: {question}

Answer:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),
}

/// A prompt with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        if !template.contains(CONTEXT_PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder(CONTEXT_PLACEHOLDER));
        }
        if !template.contains(QUESTION_PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder(QUESTION_PLACEHOLDER));
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute both placeholders in a single left-to-right pass, so
    /// placeholder-like text inside the context or question is left alone.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Join chunk contents in rank order.
pub fn build_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A rendered prompt and how many of the offered chunks it carries.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub text: String,
    pub chunks_used: usize,
}

/// Render `question` and as many top-ranked `chunks` as fit in `max_chars`
/// characters.
///
/// Chunks are dropped from the end (lowest rank) until the prompt fits. If
/// even the empty-context prompt is too long it is returned as is; the
/// question itself is never cut.
pub fn assemble(
    template: &PromptTemplate,
    question: &str,
    chunks: &[Chunk],
    max_chars: usize,
) -> AssembledPrompt {
    let mut used = chunks.len();
    loop {
        let text = template.render(&build_context(&chunks[..used]), question);
        if used == 0 || text.chars().count() <= max_chars {
            return AssembledPrompt {
                text,
                chunks_used: used,
            };
        }
        used -= 1;
    }
}
