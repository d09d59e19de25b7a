pub mod migrate;
pub mod run;

pub use migrate::handle_migrate;
pub use run::handle_run;
