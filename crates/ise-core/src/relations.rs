//! Relation tables
//!
//! Each target relation is identified by a small integer and described by a
//! [`RelationSpec`]: its canonical name, the entity types it involves, the
//! span-pair model labels that count as the relation, and the description
//! and seed example used to build completion prompts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{EntityType, IseError, Result};

/// Example sentence with its expected structured answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedExample {
    pub sentence: String,
    /// JSON object the completion service should produce for `sentence`
    pub output: String,
}

/// Static description of one target relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    /// Relation identifier
    pub id: u8,

    /// Canonical relation name (e.g. `Work_For`)
    pub name: String,

    /// Entity types considered at all when generating pairs
    pub interest_types: Vec<EntityType>,

    /// Types allowed in subject position
    pub subject_types: Vec<EntityType>,

    /// Types allowed in object position
    pub object_types: Vec<EntityType>,

    /// Span-pair model labels that mean this relation
    pub model_labels: Vec<String>,

    /// What counts as the relation, used as the prompt preamble
    pub description: String,

    /// Seed example for the prompt
    pub seed: SeedExample,
}

impl RelationSpec {
    /// Check that the relation entry is complete and internally consistent
    pub fn validate(&self) -> Result<()> {
        let missing = |what: &str| {
            Err(IseError::ConfigError(format!(
                "relation {} is missing {what}",
                self.id
            )))
        };

        if self.name.trim().is_empty() {
            return missing("a name");
        }
        if self.interest_types.is_empty() {
            return missing("entity types of interest");
        }
        if self.subject_types.is_empty() {
            return missing("subject types");
        }
        if self.object_types.is_empty() {
            return missing("object types");
        }
        if self.model_labels.is_empty() {
            return missing("span-pair labels");
        }
        if self.description.trim().is_empty() {
            return missing("a prompt description");
        }
        if self.seed.sentence.trim().is_empty() || self.seed.output.trim().is_empty() {
            return missing("a seed example");
        }

        let outside = self
            .subject_types
            .iter()
            .chain(&self.object_types)
            .find(|t| !self.interest_types.contains(t));
        if let Some(t) = outside {
            return Err(IseError::ConfigError(format!(
                "relation {}: type {t} is required but not of interest",
                self.id
            )));
        }

        Ok(())
    }

    /// Whether a span-pair label denotes this relation
    pub fn matches_label(&self, label: &str) -> bool {
        self.model_labels.iter().any(|l| l == label)
    }

    /// JSON field name the prompt uses for the subject
    pub fn subject_field(&self) -> &'static str {
        self.subject_types
            .first()
            .map(EntityType::as_str)
            .unwrap_or("subj")
    }

    /// JSON field name the prompt uses for the object
    pub fn object_field(&self) -> &'static str {
        self.object_types
            .first()
            .map(EntityType::as_str)
            .unwrap_or("obj")
    }
}

/// Relation specs keyed by identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationTable {
    specs: BTreeMap<u8, RelationSpec>,
}

impl RelationTable {
    /// Build a table from specs, validating each one
    pub fn new(specs: Vec<RelationSpec>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for spec in specs {
            spec.validate()?;
            if table.insert(spec.id, spec).is_some() {
                return Err(IseError::ConfigError(
                    "duplicate relation identifier in relation table".to_string(),
                ));
            }
        }
        if table.is_empty() {
            return Err(IseError::ConfigError("relation table is empty".to_string()));
        }
        Ok(Self { specs: table })
    }

    /// The four built-in relations
    pub fn builtin() -> Self {
        let specs = builtin_specs()
            .into_iter()
            .map(|spec| (spec.id, spec))
            .collect();
        Self { specs }
    }

    /// Look up a relation, failing with a configuration error if unknown
    pub fn spec(&self, id: u8) -> Result<&RelationSpec> {
        self.specs
            .get(&id)
            .ok_or_else(|| IseError::ConfigError(format!("unknown relation identifier: {id}")))
    }

    /// Known identifiers in ascending order
    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.specs.keys().copied()
    }
}

impl Default for RelationTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_specs() -> Vec<RelationSpec> {
    use EntityType::*;

    let locations = vec![Location, City, StateOrProvince, Country];

    vec![
        RelationSpec {
            id: 1,
            name: "Schools_Attended".to_string(),
            interest_types: vec![Person, Organization],
            subject_types: vec![Person],
            object_types: vec![Organization],
            model_labels: vec!["per:schools_attended".to_string()],
            description: "the subject is a PERSON and the object is an ORGANIZATION \
                          (a school, college or university) that the person attended."
                .to_string(),
            seed: SeedExample {
                sentence: "Jeff Bezos graduated from Princeton University in 1986.".to_string(),
                output: r#"{"PERSON": "Jeff Bezos", "ORGANIZATION": "Princeton University", "relation": "Schools_Attended"}"#
                    .to_string(),
            },
        },
        RelationSpec {
            id: 2,
            name: "Work_For".to_string(),
            interest_types: vec![Person, Organization],
            subject_types: vec![Person],
            object_types: vec![Organization],
            model_labels: vec!["per:employee_of".to_string()],
            description: "the subject is a PERSON and the object is an ORGANIZATION \
                          that employs the person."
                .to_string(),
            seed: SeedExample {
                sentence: "Alec Radford is a researcher at OpenAI.".to_string(),
                output: r#"{"PERSON": "Alec Radford", "ORGANIZATION": "OpenAI", "relation": "Work_For"}"#
                    .to_string(),
            },
        },
        RelationSpec {
            id: 3,
            name: "Live_In".to_string(),
            interest_types: {
                let mut types = vec![Person];
                types.extend(locations.iter().copied());
                types
            },
            subject_types: vec![Person],
            object_types: locations,
            model_labels: vec![
                "per:cities_of_residence".to_string(),
                "per:stateorprovinces_of_residence".to_string(),
                "per:countries_of_residence".to_string(),
            ],
            description: "the subject is a PERSON and the object is a LOCATION, CITY, \
                          STATE_OR_PROVINCE or COUNTRY where the person lives."
                .to_string(),
            seed: SeedExample {
                sentence: "Mariah Carey lives in a penthouse in New York City.".to_string(),
                output: r#"{"PERSON": "Mariah Carey", "LOCATION": "New York City", "relation": "Live_In"}"#
                    .to_string(),
            },
        },
        RelationSpec {
            id: 4,
            name: "Top_Member_Employees".to_string(),
            interest_types: vec![Organization, Person],
            subject_types: vec![Organization],
            object_types: vec![Person],
            model_labels: vec!["org:top_members/employees".to_string()],
            description: "the subject is an ORGANIZATION and the object is a PERSON who \
                          leads it or is one of its top members."
                .to_string(),
            seed: SeedExample {
                sentence: "Jensen Huang is the founder and chief executive of Nvidia.".to_string(),
                output: r#"{"ORGANIZATION": "Nvidia", "PERSON": "Jensen Huang", "relation": "Top_Member_Employees"}"#
                    .to_string(),
            },
        },
    ]
}
