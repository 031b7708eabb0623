//! Classification and parsing of inbound documents

mod envelope;
mod parser;

pub use envelope::Envelope;
pub use parser::{classify, discriminator, parse_message};
