//! Identifier and flag types shared by the session and the pipeline.

mod flags;
mod identifiers;
mod sequence;

pub use flags::Flag;
pub use identifiers::SeqNum;
pub use sequence::SequenceSet;
