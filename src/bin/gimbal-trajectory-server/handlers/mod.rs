pub mod api_error;
pub mod discretize;
pub mod index;
pub mod plot;

pub(crate) use discretize::{handle_discretize, handle_discretize_all};
pub(crate) use index::handle_index;
pub(crate) use plot::{handle_plot, handle_profile};
