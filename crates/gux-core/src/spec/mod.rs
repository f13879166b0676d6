//! GUX spec language: lexer, structural parser and the typed tree.

mod lexer;
pub mod model;
mod parser;

use std::path::Path;

pub use model::{
    Assertions, Bounds, ColourExpectation, ColourToken, Node, PageSpec, SpecTree, StyleMap,
    StyleValue, Viewport, WidgetNode, ZoneSpec, COLOUR_PROPERTIES,
};
pub use parser::parse;

/// Read and parse a spec file.
pub fn parse_file(path: impl AsRef<Path>) -> crate::Result<SpecTree> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let tree = parse(&text)?;
    tracing::debug!(path = %path.display(), zones = tree.zones().len(), "spec file loaded");
    Ok(tree)
}
