mod crd;
mod descriptor;

pub use crd::CrdCache;
pub use descriptor::*;
