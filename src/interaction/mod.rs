pub mod confirm;
pub mod controller;
pub mod input;
pub mod timers;
