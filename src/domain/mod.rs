mod alert;
mod caller;
mod integration;

pub use alert::*;
pub use caller::*;
pub use integration::*;
