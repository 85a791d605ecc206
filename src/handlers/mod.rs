mod invite;

pub use invite::{create_handler, redirect_handler, update_handler};
