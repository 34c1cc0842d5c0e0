pub mod fold;
pub mod tree;
