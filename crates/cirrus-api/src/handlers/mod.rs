pub mod file_download;
pub mod file_upload;
pub mod folder_upload;
pub mod health;
pub mod thumbnail;
