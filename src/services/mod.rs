pub mod archive;
pub mod extraction;
pub mod maps;
pub mod progress;
pub mod queue;
pub mod worker;
