pub mod collapse;
pub mod connect;
pub mod errors;
pub mod graph;
pub mod layout;
pub mod search;
pub mod spatial;
