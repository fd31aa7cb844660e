pub mod deadline;
pub mod extraction;
pub mod import;
pub mod processor;
pub mod security;
