pub use crate::descriptor::ComponentIds;
pub use smallvec::smallvec;
