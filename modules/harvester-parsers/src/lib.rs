//! Parser Bank (§4.4): a closed ladder of extractors sharing one contract.

pub mod bank;
pub mod embedded_state;
pub mod jsonld;
pub mod pdf;
pub mod readability;
pub mod table;
pub mod types;

pub use bank::ParserBank;
pub use pdf::OcrProvider;
pub use types::{NodeKind, ParseInput, ParsedDocument, ParsedNode, ParserStep};
