mod server;
mod session;

pub use server::{SshServer, load_or_generate_host_key, start_ssh_server};
