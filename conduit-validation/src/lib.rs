//! Validation descriptors for Conduit
//!
//! Commands and queries describe their inputs as an ordered list of field
//! rules (`required`, `type`, `min`, `max`, `pattern`, `enum`). Validation runs
//! against the JSON form of the input and reports a field to messages map
//! covering exactly the fields that failed.
//!
//! # Examples
//!
//! ```
//! use conduit_validation::{FieldRules, FieldType, ValidationDescriptor, UUID_PATTERN};
//! use serde_json::json;
//!
//! let descriptor = ValidationDescriptor::new()
//!     .field(FieldRules::for_field("id").required().of_type(FieldType::String).pattern(&UUID_PATTERN))
//!     .field(FieldRules::for_field("version").required().of_type(FieldType::Number).min(0.0));
//!
//! let errors = descriptor.validate(&json!({ "version": -1 })).unwrap_err();
//! assert_eq!(errors.fields(), vec!["id", "version"]);
//! ```
//!
//! ## Typed inputs
//!
//! ```
//! use conduit_validation::{FieldRules, FieldType, Validate, ValidationDescriptor};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Rename {
//!     name: String,
//! }
//!
//! impl Validate for Rename {
//!     fn validation() -> ValidationDescriptor {
//!         ValidationDescriptor::new()
//!             .field(FieldRules::for_field("name").required().of_type(FieldType::String).max(100.0))
//!     }
//! }
//!
//! assert!(Rename { name: "widget".into() }.validate().is_ok());
//! ```

mod errors;
mod rules;
mod traits;
mod validators;

pub use errors::*;
pub use rules::*;
pub use traits::*;
pub use validators::*;
