//! Formatting-preserving translation.

mod entity;
mod language;
pub mod markup;
mod normalize;
mod runs;

pub use entity::{EntityTranslator, TranslatorSettings};
pub use language::looks_like_target;
pub use markup::{escape_html_attr, escape_html_text};
pub use runs::{Run, partition};
