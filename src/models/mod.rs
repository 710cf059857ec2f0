pub mod product;
pub mod snapshot;

pub use product::{PriceRecord, TrackedProduct};
pub use snapshot::ProductSnapshot;
