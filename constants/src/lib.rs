pub mod codec;
pub mod columns;
pub mod sh;
