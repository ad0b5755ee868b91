//! One module per command

pub mod analyze;
pub mod api_server;
pub mod binding;
pub mod build_images;
pub mod completion;
pub mod delete;
pub mod deploy;
pub mod describe;
pub mod dev;
pub mod init;
pub mod list;
pub mod login;
pub mod logs;
pub mod namespace;
pub mod preference;
pub mod registry;
pub mod run;
pub mod telemetry;
pub mod version;
