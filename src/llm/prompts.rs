//! Prompt templates.
//!
//! Placeholders are `{name}` and filled with [`Prompts::fill`].

/// Collection of prompts used for question generation, answering and judging.
pub struct Prompts;

impl Prompts {
    /// Fill `{name}` placeholders in a single pass over the template.
    ///
    /// Substituted text is never rescanned, so a document containing
    /// `{question}` stays literal. Unknown placeholders are left as is.
    pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| {
                let name = &after[..close];
                values
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (close, *value))
            });
            match value {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// Generate questions from one chunk of context.
    ///
    /// Placeholders: `{context}`, `{query}`.
    pub fn question_generation() -> &'static str {
        r#"Context information is below.
---------------------
{context}
---------------------
Given the context information and not prior knowledge.
generate only questions based on the below query.
{query}
"#
    }

    /// Answer a query from retrieved context.
    ///
    /// Placeholders: `{context}`, `{question}`.
    pub fn text_qa() -> &'static str {
        r#"Context information is below.
---------------------
{context}
---------------------
Given the context information and not prior knowledge, answer the query.
Query: {question}
Answer: "#
    }

    /// Judge whether a response is in line with its source context.
    ///
    /// Placeholders: `{query}` (query and response), `{context}`.
    pub fn relevancy_eval() -> &'static str {
        r#"Your task is to evaluate if the response for the query is in line with the context information provided.
You have two options to answer. Either YES/ NO.
Answer - YES, if the response for the query is in line with context information otherwise NO.
Query and Response:
 {query}
Context:
 {context}
Answer: "#
    }
}
