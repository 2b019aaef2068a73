//! Extraction Context Assembler (§4.7): ranks evidence and builds the
//! per-field packet handed to the LLM Router.

pub mod assembler;
pub mod ranking;
pub mod types;

pub use assembler::assemble_packet;
pub use ranking::{rank_evidence, root_domain};
pub use types::{ExtractionPacket, FieldContractSnapshot, RankedEvidence};
