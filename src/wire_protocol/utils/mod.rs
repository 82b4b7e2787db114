pub mod frame;

pub use frame::{TaggedHeader, be_i32, be_u32, tagged_header};
