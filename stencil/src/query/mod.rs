//! Query, update and projection document builders.

mod ops;
mod parametric;
mod q;

pub use ops::{Filter, Update};
pub use parametric::{filter, projection, update};
pub use q::{Combinator, Q, Within};
