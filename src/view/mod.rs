pub mod legend;
pub mod view;
