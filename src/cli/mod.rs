pub mod context;
pub mod export;
pub mod extract;
pub mod import;
pub mod inspect;
pub mod load;
pub mod search;
pub mod stats;

use anyhow::{bail, Result};
use std::collections::BTreeSet;

use cake::knowledge::extract::EntityType;

/// Parse a comma-separated list of entity type names (`ip_address,domain`).
pub fn parse_entity_types(list: &str) -> Result<BTreeSet<EntityType>> {
    let mut types = BTreeSet::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match name.parse() {
            Ok(t) => {
                types.insert(t);
            }
            Err(e) => bail!("{e}"),
        }
    }
    Ok(types)
}

/// Split a comma-separated list into trimmed, non-empty items.
pub fn parse_list(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_lists() {
        let types = parse_entity_types("ip_address, domain,").unwrap();
        assert_eq!(
            types,
            BTreeSet::from([EntityType::IpAddress, EntityType::Domain])
        );
        assert!(parse_entity_types("ip_address,planet").is_err());
    }

    #[test]
    fn plain_lists() {
        assert_eq!(
            parse_list(" uses ,implements,,"),
            BTreeSet::from(["uses".to_string(), "implements".to_string()])
        );
    }
}
