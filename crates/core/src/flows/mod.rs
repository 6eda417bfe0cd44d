pub mod input;
pub mod states;
