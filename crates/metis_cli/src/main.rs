//! Version probe for the Metis server core.
//!
//! Prints the core version and the default RPC address so a build can be
//! checked without starting any listener.

fn main() {
    let config = metis_core::Config::default();
    println!("Metis Server: {}", metis_core::core_version());
    println!("RPC address: {}", config.rpc_addr());
    println!("Document collection: {}", config.document.collection);
}
