pub mod health;
pub mod media;
pub mod static_file;
