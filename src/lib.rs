// ABOUTME: Library root for sshkit - SSH sessions with exec, SCP and SFTP.
// ABOUTME: The command-line front end is in main.rs.

pub mod config;
pub mod error;
pub mod output;
pub mod ssh;
