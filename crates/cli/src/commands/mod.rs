pub mod cart;
pub mod notices;
pub mod sync;
