pub mod events;
pub mod stream;
pub mod system;
