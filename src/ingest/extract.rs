//! Parse single-shot extraction output into entity and relation records.
//!
//! Output grammar: records separated by `##`, terminated by `<|COMPLETE|>`,
//! each shaped `("entity"<|>name<|>type<|>description)` or
//! `("relationship"<|>src<|>tgt<|>description<|>...)`. Names and types are
//! upper-cased; records that do not fit are skipped.

use crate::graph::{EntityRecord, RelationRecord};
use crate::prompts::{COMPLETION_DELIMITER, RECORD_DELIMITER, TUPLE_DELIMITER};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub entities: Vec<EntityRecord>,
    pub relations: Vec<RelationRecord>,
}

pub fn parse_extraction(output: &str, chunk_id: &str) -> Extraction {
    let mut out = Extraction::default();
    let body = output.split(COMPLETION_DELIMITER).next().unwrap_or_default();

    for record in body.split(RECORD_DELIMITER) {
        let Some(inner) = parenthesized(record) else { continue };
        let fields: Vec<String> = inner.split(TUPLE_DELIMITER).map(clean).collect();
        let Some(kind) = fields.first() else { continue };

        match kind.to_lowercase().as_str() {
            "entity" if fields.len() >= 4 => {
                let name = fields[1].to_uppercase();
                if name.is_empty() {
                    continue;
                }
                out.entities.push(EntityRecord {
                    name,
                    entity_type: fields[2].to_uppercase(),
                    description: fields[3].clone(),
                    source_id: chunk_id.to_string(),
                });
            }
            "relationship" if fields.len() >= 4 => {
                let (src, tgt) = (fields[1].to_uppercase(), fields[2].to_uppercase());
                if src.is_empty() || tgt.is_empty() || src == tgt {
                    continue;
                }
                out.relations.push(RelationRecord {
                    src_id: src,
                    tgt_id: tgt,
                    description: fields[3].clone(),
                    source_id: chunk_id.to_string(),
                });
            }
            _ => {}
        }
    }
    out
}

/// Text between the first `(` and the last `)` of the first line that has both.
fn parenthesized(record: &str) -> Option<&str> {
    record.lines().find_map(|line| {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        (end > start).then(|| &line[start + 1..end])
    })
}

/// Trim whitespace and surrounding quotes.
fn clean(field: &str) -> String {
    field.trim().trim_matches('"').trim_matches('\'').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"("entity"<|>Water<|>substance<|>A clear liquid.)##
("entity"<|>"Hydrogen"<|>element<|>The lightest element.)##
("relationship"<|>Water<|>Hydrogen<|>Water molecules contain hydrogen atoms.<|>8)##
<|COMPLETE|>
("entity"<|>Ignored<|>x<|>after completion)"#;

    #[test]
    fn parses_entities_and_relations() {
        let ex = parse_extraction(OUTPUT, "chunk-1");
        assert_eq!(ex.entities.len(), 2);
        assert_eq!(ex.entities[0].name, "WATER");
        assert_eq!(ex.entities[0].entity_type, "SUBSTANCE");
        assert_eq!(ex.entities[1].name, "HYDROGEN");
        assert_eq!(ex.relations.len(), 1);
        assert_eq!(ex.relations[0].description, "Water molecules contain hydrogen atoms.");
        assert_eq!(ex.relations[0].source_id, "chunk-1");
    }

    #[test]
    fn malformed_records_are_skipped() {
        let ex = parse_extraction(r#"garbage##("entity"<|>only two)##("relationship"<|>A<|>A<|>self)"#, "c");
        assert!(ex.entities.is_empty());
        assert!(ex.relations.is_empty());
    }

    #[test]
    fn text_without_records_yields_nothing() {
        let ex = parse_extraction("[echo] -Goal- Given a text document", "c");
        assert_eq!(ex, Extraction::default());
    }
}
