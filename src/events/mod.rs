pub mod route;
pub mod tick;
