//! Prompt templates for grounded answers

use crate::types::SearchResult;

/// Prompt builder for retrieval-grounded questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build numbered context excerpts from search results
    pub fn build_context(results: &[SearchResult]) -> String {
        let mut context = String::new();

        for (i, result) in results.iter().enumerate() {
            context.push_str(&format!(
                "[{}] {} (fragmento {})\n{}\n\n---\n\n",
                i + 1,
                result.chunk.source_id,
                result.chunk.sequence_index + 1,
                result.chunk.text
            ));
        }

        context
    }

    /// Build the full grounded prompt: retrieved material plus the question
    pub fn build_grounded_prompt(question: &str, context: &str) -> String {
        format!(
            r#"Eres un asistente de estudio que ayuda a estudiantes a entender el material de su curso.

INSTRUCCIONES:
1. Responde en el mismo idioma de la pregunta.
2. Usa únicamente la información del material citado abajo.
3. Explica paso a paso cuando la pregunta lo pida.
4. Si la respuesta no está en el material, dilo claramente en lugar de inventarla.

MATERIAL DEL CURSO:
{context}

PREGUNTA: {question}

RESPUESTA:"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    #[test]
    fn context_is_numbered_with_sources() {
        let results = vec![
            SearchResult {
                chunk: Chunk::new("La pantalla va al HDMI.", "tema1.pdf", 0),
                similarity: 0.9,
            },
            SearchResult {
                chunk: Chunk::new("El teclado es USB.", "tema2.pdf", 3),
                similarity: 0.7,
            },
        ];

        let context = PromptBuilder::build_context(&results);
        assert!(context.contains("[1] tema1.pdf (fragmento 1)"));
        assert!(context.contains("[2] tema2.pdf (fragmento 4)"));
        assert!(context.contains("La pantalla va al HDMI."));
    }

    #[test]
    fn grounded_prompt_embeds_context_and_question() {
        let prompt = PromptBuilder::build_grounded_prompt("¿Cómo conecto la pantalla?", "[1] tema1.pdf\ntexto");
        assert!(prompt.contains("MATERIAL DEL CURSO:"));
        assert!(prompt.contains("[1] tema1.pdf"));
        assert!(prompt.contains("PREGUNTA: ¿Cómo conecto la pantalla?"));
    }

    #[test]
    fn empty_results_give_empty_context() {
        assert_eq!(PromptBuilder::build_context(&[]), "");
    }
}
