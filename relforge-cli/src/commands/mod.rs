pub mod diff;
pub mod finalize;
pub mod init;
pub mod pkg;
pub mod point;
pub mod run;
pub mod status;
pub mod update;
pub mod watch;
