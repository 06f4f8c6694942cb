pub mod apply_ext;
pub mod owner_ext;
