//! Entity kinds, input validation and transactional write flows

pub mod entity;
pub mod validation;

pub use entity::{EntityKind, POSTS, PRODUCTS};
pub use validation::FieldErrors;
