//! Form field resolution.
//!
//! Turns an opaque registration-form link into a mapping from semantic
//! field names to the form's internal field identifiers, by fetching the
//! rendered page and walking the data blob the forms host embeds in it.

pub mod fields;
pub mod resolver;

pub use fields::{FieldMap, FormField};
pub use resolver::{FieldResolver, FormFieldResolver, FormResolveError};
