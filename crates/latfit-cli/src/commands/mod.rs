pub mod cells;
pub mod refine;
