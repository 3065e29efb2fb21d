//! Small pure helpers the dashboard screens share with the grade matrix.
pub mod cascade;
pub mod menu;
pub mod mirror;
