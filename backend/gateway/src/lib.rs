pub mod routes;
pub mod server;
pub mod sweeper;

pub use routes::{build_router, AppState};
pub use server::start_server;
pub use sweeper::{run_sweeper, SweeperConfig};
