mod activation;
mod license;
mod product;

pub use activation::*;
pub use license::*;
pub use product::*;
