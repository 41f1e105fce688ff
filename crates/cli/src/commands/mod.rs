pub mod build_ids;
pub mod config;
pub mod inspect;
pub mod normalize;
pub mod save_path;
pub mod util;

pub use build_ids::*;
pub use config::*;
pub use inspect::*;
pub use normalize::*;
pub use save_path::*;
pub use util::*;
