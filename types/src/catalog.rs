//! Static variant and character tables, loaded once at startup and shared
//! read-only afterwards.

use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: i32,
    pub name: String,
    pub suits: Vec<String>,
}

impl Variant {
    pub fn max_score(&self) -> usize {
        self.suits.len() * 5
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    variants: Vec<Variant>,
    #[serde(default)]
    characters: Vec<Character>,
}

#[derive(Clone, Debug)]
pub struct Catalog {
    variants: HashMap<String, Variant>,
    characters: HashMap<String, Character>,
}

impl Catalog {
    pub fn new(variants: Vec<Variant>, characters: Vec<Character>) -> Result<Self, CatalogError> {
        let mut variant_map = HashMap::with_capacity(variants.len());
        for variant in variants {
            let name = variant.name.clone();
            if variant_map.insert(name.clone(), variant).is_some() {
                return Err(CatalogError::Duplicate {
                    kind: "variant",
                    name,
                });
            }
        }
        let mut character_map = HashMap::with_capacity(characters.len());
        for character in characters {
            let name = character.name.clone();
            if character_map.insert(name.clone(), character).is_some() {
                return Err(CatalogError::Duplicate {
                    kind: "character",
                    name,
                });
            }
        }
        Ok(Self {
            variants: variant_map,
            characters: character_map,
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.variants, file.characters)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let yaml = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml(&yaml)?;
        log::info!(
            "Loaded {} variants and {} characters from {}",
            catalog.variants.len(),
            catalog.characters.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn standard() -> Self {
        let suits = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let variants = vec![
            Variant {
                id: 0,
                name: "No Variant".to_string(),
                suits: suits(&["Red", "Yellow", "Green", "Blue", "Purple"]),
            },
            Variant {
                id: 1,
                name: "Six Suits".to_string(),
                suits: suits(&["Red", "Yellow", "Green", "Blue", "Purple", "Teal"]),
            },
            Variant {
                id: 2,
                name: "Four Suits".to_string(),
                suits: suits(&["Red", "Yellow", "Green", "Blue"]),
            },
            Variant {
                id: 3,
                name: "Rainbow (5 Suits)".to_string(),
                suits: suits(&["Red", "Yellow", "Green", "Blue", "Rainbow"]),
            },
        ];
        let characters = ["Fuming", "Dumbfounded", "Inept", "Awkward", "Conservative"]
            .iter()
            .enumerate()
            .map(|(i, name)| Character {
                id: i as i32 + 1,
                name: name.to_string(),
            });
        Self {
            variants: variants.into_iter().map(|v| (v.name.clone(), v)).collect(),
            characters: characters.map(|c| (c.name.clone(), c)).collect(),
        }
    }

    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.get(name)
    }

    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.get(name)
    }

    pub fn character_names(&self) -> Vec<String> {
        let mut characters: Vec<_> = self.characters.values().collect();
        characters.sort_by_key(|c| c.id);
        characters.into_iter().map(|c| c.name.clone()).collect()
    }
}
