//! Projection translation: `Select` selectors become `(owner, name)`
//! pairs. Only zero- or one-level-deep property chains are supported.

use crate::error::{QueryError, QueryResult};
use crate::query::ProjectionEntry;
use crate::translate::expr::TypedExpr;

#[derive(Debug, Default)]
pub struct ProjectionTranslator {
    entries: Vec<ProjectionEntry>,
}

impl ProjectionTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, selector: &TypedExpr) -> QueryResult<()> {
        match selector {
            TypedExpr::Property { owner, name } => {
                if let Some(owner) = owner {
                    if owner.contains('.') {
                        return Err(QueryError::NotSupported(format!(
                            "projection member {}.{} is nested more than one level deep",
                            owner, name
                        )));
                    }
                }
                self.entries.push(ProjectionEntry {
                    owner: owner.clone(),
                    name: name.clone(),
                });
                Ok(())
            }
            other => Err(QueryError::NotSupported(format!(
                "projection selector must be a property access, got {:?}",
                other
            ))),
        }
    }

    pub fn into_entries(self) -> Vec<ProjectionEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::expr::{prop, prop_of, value};

    #[test]
    fn test_bare_and_owned_properties() {
        let mut translator = ProjectionTranslator::new();
        translator.add(&prop("Name")).unwrap();
        translator.add(&prop_of("Address", "City")).unwrap();

        let entries = translator.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].to_string(), "Name");
        assert_eq!(entries[1].to_string(), "Address.City");
    }

    #[test]
    fn test_deep_chain_is_rejected_naming_member() {
        let mut translator = ProjectionTranslator::new();
        let err = translator.add(&prop_of("Address.Country", "Code")).unwrap_err();
        match err {
            QueryError::NotSupported(message) => {
                assert!(message.contains("Address.Country.Code"), "{}", message);
            }
            other => panic!("expected not-supported, got {:?}", other),
        }
    }

    #[test]
    fn test_non_property_is_rejected() {
        let mut translator = ProjectionTranslator::new();
        assert!(translator.add(&value(1)).is_err());
    }
}
