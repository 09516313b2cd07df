use filemind_vector::RetrievedChunk;

pub(crate) const ASK_SYSTEM: &str = "You are filemind, a careful assistant answering questions about the user's \
local documents. Use only the supplied excerpts. If they do not contain the answer, say so plainly. \
Mention the file names you relied on.";

pub(crate) const SUMMARY_SYSTEM: &str = "You summarize documents for their owner. Be concise and factual; \
lead with the main point, then list the key details as short bullets.";

pub(crate) fn render_context(chunks: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(&format!(
            "File: {}\nPath: {}\nScore: {:.3}\n{}\n---\n",
            chunk.source_name,
            chunk.source_path,
            chunk.score,
            chunk.text.trim()
        ));
    }
    out
}

pub(crate) fn build_question(question: &str, context_block: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("Excerpts:\n");
    prompt.push_str(context_block);
    prompt.push_str("\nQuestion:\n");
    prompt.push_str(question.trim());
    prompt
}

pub(crate) fn build_summary_request(name: &str, text: &str, truncated: bool) -> String {
    let mut prompt = format!("Summarize the document \"{name}\".");
    if truncated {
        prompt.push_str(" Only its beginning is included.");
    }
    prompt.push_str("\n\n");
    prompt.push_str(text);
    prompt
}

pub(crate) fn document_system(name: &str, text: &str) -> String {
    format!(
        "You are discussing the document \"{name}\" with its owner. Answer from its contents; \
         say so when the document does not cover a question.\n\nDocument:\n{text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_lists_every_chunk() {
        let chunks = vec![
            RetrievedChunk { source_name: "a.txt".into(), source_path: "d/a.txt".into(), score: 0.91, text: " alpha ".into() },
            RetrievedChunk { source_name: "b.md".into(), source_path: "d/b.md".into(), score: 0.4, text: "beta".into() },
        ];
        let block = render_context(&chunks);
        assert!(block.contains("File: a.txt\nPath: d/a.txt\nScore: 0.910\nalpha\n---"));
        assert!(block.contains("File: b.md"));
        assert!(build_question("  why? ", &block).ends_with("Question:\nwhy?"));
    }
}
