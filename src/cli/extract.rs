//! CLI `extract` command: show the entities recognized in a piece of text.

use anyhow::Result;

use cake::knowledge::extract;

pub fn extract(text: &str, types: Option<&str>, json: bool) -> Result<()> {
    let types = types.map(super::parse_entity_types).transpose()?;
    let entities = extract::extract(text, types.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&entities)?);
        return Ok(());
    }

    if entities.is_empty() {
        println!("No entities found.");
        return Ok(());
    }
    for entity in &entities {
        println!(
            "  {:<12} {:<40} (confidence: {:.2}, span: {}..{})",
            entity.entity_type.as_str(),
            entity.value,
            entity.confidence,
            entity.span.start,
            entity.span.end,
        );
    }

    let keywords = extract::keywords(text);
    if !keywords.is_empty() {
        println!();
        println!("Keywords: {}", keywords.join(", "));
    }
    Ok(())
}
