//! Built-in prompt templates.
//!
//! Placeholders are `{name}` and are filled by [`render`]. Extraction output
//! uses the record grammar parsed by `ingest::extract`.

/// Separates fields inside one extraction record.
pub const TUPLE_DELIMITER: &str = "<|>";
/// Separates extraction records.
pub const RECORD_DELIMITER: &str = "##";
/// Marks the end of extraction output.
pub const COMPLETION_DELIMITER: &str = "<|COMPLETE|>";

pub const ENTITY_TYPES: &str = "concept, date, location, keyword, organization, person, event, work, nature, artificial, science, technology, mission, gene";

pub const KG_EXTRACTION: &str = r#"-Goal-
Given a text document, identify all entities of the types [{entity_types}] and all relationships among the identified entities.

-Steps-
1. For each entity output ("entity"{tuple_delimiter}<entity_name>{tuple_delimiter}<entity_type>{tuple_delimiter}<entity_description>)
2. For each pair of clearly related entities output ("relationship"{tuple_delimiter}<source_entity>{tuple_delimiter}<target_entity>{tuple_delimiter}<relationship_description>)
3. Separate records with {record_delimiter}.
4. When finished, output {completion_delimiter}

-Real Data-
Text: {input_text}
Output:
"#;

pub const DESCRIPTION_SUMMARIZATION: &str = r#"You are given one entity or relation and a list of descriptions of it.
Write a single comprehensive description that covers every fact in the list, resolving contradictions. Write in the third person and include the name.

Name: {entity_name}
Descriptions:
{description_list}
Output:
"#;

pub const DESCRIPTION_REPHRASING: &str = r#"-Goal-
Rephrase the input sentence with different wording while keeping its meaning exactly the same.

-Real Data-
Input: {input_sentence}
Output:
"#;

pub const ANTI_DESCRIPTION_REPHRASING: &str = r#"-Goal-
Transform the input sentence into its opposite meaning while preserving most of the sentence structure.
Change only the key words that carry the core meaning. The input is a correct description; the output must be a wrong one, fluent and grammatical.

-Real Data-
Input: {input_sentence}
Output:
"#;

pub const STATEMENT_JUDGEMENT: &str = r#"Please judge whether the following statement is true. Answer only "yes" or "no".
Statement: {statement}
Judgement:"#;

pub const ANSWER_REPHRASING: &str = r#"-Goal-
Using only the entities and relationships below, write a coherent passage that states all of the facts they contain.

-Entities-
{entities}

-Relationships-
{relationships}

Passage:
"#;

pub const QUESTION_GENERATION: &str = r#"The answer to a question is provided. Please generate a question that corresponds to the answer.

Answer:
{answer}
Question:
"#;

/// Replace every `{key}` in `template` with its value.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Extraction prompt for one chunk.
pub fn kg_extraction(input_text: &str) -> String {
    render(
        KG_EXTRACTION,
        &[
            ("entity_types", ENTITY_TYPES),
            ("tuple_delimiter", TUPLE_DELIMITER),
            ("record_delimiter", RECORD_DELIMITER),
            ("completion_delimiter", COMPLETION_DELIMITER),
            ("input_text", input_text),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_all_placeholders() {
        let out = render("{a} and {b}, {a}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and y, x");
    }

    #[test]
    fn extraction_prompt_carries_delimiters() {
        let p = kg_extraction("Water boils at 100 C.");
        assert!(p.contains("Water boils at 100 C."));
        assert!(p.contains(TUPLE_DELIMITER));
        assert!(p.contains(COMPLETION_DELIMITER));
        assert!(!p.contains("{input_text}"));
    }

    #[test]
    fn judgement_prompt_embeds_statement() {
        let p = render(STATEMENT_JUDGEMENT, &[("statement", "Ice is cold.")]);
        assert!(p.ends_with("Judgement:"));
        assert!(p.contains("Ice is cold."));
    }
}
