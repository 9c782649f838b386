pub mod graph_utils;
pub mod host;
pub mod interaction;
pub mod persistence;

pub use graph_utils::graph::GraphDatabase;
pub use interaction::controller::GraphEditor;
