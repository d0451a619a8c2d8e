use crate::pipeline::RetrievedPassage;

/// Prompt asking the model to rewrite a vague query for retrieval.
pub fn rewrite_prompt(domain: &str, query: &str) -> String {
    format!(
        "You rewrite search queries about {domain}.\n\
         Rewrite the query below so it is specific and self-contained. \
         Respond with the rewritten query only, without quotes or commentary.\n\n\
         Query: {query}"
    )
}

/// Prompt grounding the answer in the retrieved passages.
pub fn answer_prompt(domain: &str, query: &str, context: &str) -> String {
    format!(
        "You are an assistant answering questions about {domain}.\n\
         Answer using only the numbered context passages below. \
         If the context does not contain the answer, say that you do not know.\n\n\
         Context:\n{context}\n\n\
         Question: {query}\n\n\
         Answer:"
    )
}

/// Renders retrieved passages as a numbered context block, best match first.
pub fn render_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, passage)| format!("[Source {}] {}", i + 1, passage.record.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use common::storage::types::chunk::ChunkRecord;

    use super::*;

    fn passage(content: &str) -> RetrievedPassage {
        RetrievedPassage {
            record: ChunkRecord {
                content: content.into(),
                ..ChunkRecord::default()
            },
            distance: 0.2,
            similarity: crate::scoring::similarity_from_distance(0.2),
        }
    }

    #[test]
    fn context_is_numbered_from_one() {
        let rendered = render_context(&[
            passage("Home loan rates start at 8.35 percent."),
            passage("Processing fees are waived for salaried applicants."),
        ]);
        assert!(rendered.starts_with("[Source 1] Home loan rates"));
        assert!(rendered.contains("[Source 2] Processing fees"));
    }

    #[test]
    fn prompts_embed_domain_and_query() {
        let prompt = answer_prompt("retail loan products", "What is the margin?", "[Source 1] x");
        assert!(prompt.contains("retail loan products"));
        assert!(prompt.contains("What is the margin?"));
        assert!(prompt.contains("[Source 1] x"));
    }
}
