pub mod action;
pub mod card;
pub mod catalog;
pub mod end_condition;
pub mod game;
pub mod options;
pub mod player;
pub mod rules;
pub mod timing;

pub use action::{Action, Clue};
pub use card::{Card, SimpleCard};
pub use catalog::{Catalog, CatalogError, Character, Variant};
pub use end_condition::EndCondition;
pub use game::{Game, GameError};
pub use options::GameOptions;
pub use player::GamePlayer;
pub use rules::{RulesEngine, StandardRules};
