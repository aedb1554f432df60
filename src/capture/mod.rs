pub mod parser;
pub mod supervisor;
