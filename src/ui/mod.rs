pub mod display;
pub mod top;

pub use display::{draw_top, TopState};
pub use top::run_top;
