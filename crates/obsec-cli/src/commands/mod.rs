pub mod clean;
pub mod info;
pub mod init;
pub mod open;
pub mod workspaces;
