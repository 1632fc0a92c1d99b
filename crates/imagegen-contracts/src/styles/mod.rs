mod catalog;

pub use catalog::{StyleCatalog, StyleSpec, NO_STYLE};
