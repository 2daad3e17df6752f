pub mod linear;
pub mod mvptree;
pub mod traits;

pub use linear::LinearIndex;
pub use mvptree::{MvpTree, Point, SharedMvpTree};
pub use traits::MetricIndex;
