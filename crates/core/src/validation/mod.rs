//! Declarative checks run before any content is streamed.

pub mod count;
pub mod media_type;

#[cfg(test)]
mod count_props;

pub use count::{CountMode, CountValidator, check_bounds};
pub use media_type::{is_accepted, media_type_for_extension, validate_media_type};
