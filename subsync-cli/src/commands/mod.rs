//! One module per subcommand; each exposes a clap `Args` struct with `run`.

pub mod authors;
pub mod refs;
pub mod status;
pub mod sync;
