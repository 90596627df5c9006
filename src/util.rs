pub mod key;
pub mod object;
