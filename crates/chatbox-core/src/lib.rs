pub mod actions;
pub mod config;
pub mod interactive;
pub mod reducer;
pub mod response_data;
pub mod session;
pub mod state;
pub mod variables;

pub use actions::*;
pub use config::*;
pub use interactive::*;
pub use reducer::*;
pub use response_data::*;
pub use session::*;
pub use state::*;
pub use variables::*;
