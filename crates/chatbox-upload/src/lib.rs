pub mod accept;
pub mod contracts;
pub mod controller;
pub mod traversal;
pub mod uploader;

pub use accept::*;
pub use contracts::*;
pub use controller::*;
pub use traversal::*;
pub use uploader::*;
