pub mod chrome;
pub mod flow_diagram;
pub mod questions;
