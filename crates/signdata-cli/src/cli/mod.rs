pub mod approval;
pub mod args;
pub mod artifact;
pub mod commands;
