pub mod grid;
pub mod serial;
pub mod session;
pub mod sim;
pub mod tree;
pub mod validate;
