#[cfg(test)]
pub mod api_server;
pub mod labels;
pub mod managed_ext;
pub mod reference_ext;
pub mod secret_ext;
