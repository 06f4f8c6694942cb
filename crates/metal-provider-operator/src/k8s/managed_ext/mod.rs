pub mod patch_ext;
pub mod status_ext;
