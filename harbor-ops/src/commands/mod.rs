pub mod cert;
pub mod trust;
