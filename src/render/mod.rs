mod tree_printer;

pub use tree_printer::{configure_color, render_snapshot};
