//! Answer composition: prompt assembly plus one bounded generation call.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use petcare_rag_core::embedding::GenerationProvider;
use petcare_rag_core::models::Chunk;
use petcare_rag_core::prompt::{assemble, PromptTemplate};
use petcare_rag_core::{Capability, RagError, Result};

use crate::capability::bounded;

pub struct Composer {
    generator: Arc<dyn GenerationProvider>,
    template: PromptTemplate,
    max_prompt_chars: usize,
    timeout: Duration,
}

impl Composer {
    pub fn new(
        generator: Arc<dyn GenerationProvider>,
        template: PromptTemplate,
        max_prompt_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            template,
            max_prompt_chars,
            timeout,
        }
    }

    /// Generate an answer to `question` grounded in `chunks` (best first).
    ///
    /// Lowest-ranked chunks are left out when the prompt would exceed the
    /// size limit. Blank model output is a [`RagError::Generation`].
    pub async fn compose(&self, question: &str, chunks: &[Chunk]) -> Result<String> {
        let prompt = assemble(&self.template, question, chunks, self.max_prompt_chars);
        if prompt.chunks_used < chunks.len() {
            debug!(
                offered = chunks.len(),
                used = prompt.chunks_used,
                "prompt over size limit, dropped lowest-ranked chunks"
            );
        }

        let output = bounded(
            Capability::Generation,
            self.timeout,
            self.generator.generate(&prompt.text),
        )
        .await?;

        let answer = output.trim();
        if answer.is_empty() {
            return Err(RagError::Generation(format!(
                "model '{}' returned an empty answer",
                self.generator.model_name()
            )));
        }
        Ok(answer.to_string())
    }
}
