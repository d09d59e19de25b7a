use std::env;

pub fn main() {
    // Migrations are embedded with embed_migrations!
    println!("cargo:rerun-if-changed=migrations");

    // Configure static linking for musl targets (used by cross for static builds)
    let target = env::var("TARGET").unwrap_or_default();
    if target.contains("musl") {
        configure_musl_static_linking();
    }
}

/// musl builds need libpq compiled from source, which the bundled-postgres feature provides
fn configure_musl_static_linking() {
    println!("cargo:warning=Configuring bundled PostgreSQL build for musl static linking");

    // Cargo exposes enabled features to build scripts as env vars, not cfgs
    if env::var_os("CARGO_FEATURE_BUNDLED_POSTGRES").is_none() {
        println!("cargo:warning=bundled-postgres feature not enabled - build may fail!");
        println!("cargo:warning=Use: cargo build --features bundled-postgres");
    }
}
