pub mod check;
pub mod init_db;
pub mod reframe;
pub mod snapshot;
