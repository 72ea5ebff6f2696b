pub mod calculi;
pub mod logic;
pub mod set;

pub use logic::classify::Classification;
pub use logic::coalition::{Agent, Coalition};
pub use logic::Formula;
pub use set::FormulaSet;

pub use calculi::tableaux;
