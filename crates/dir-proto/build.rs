fn main() -> Result<(), Box<dyn std::error::Error>> {
    let protos = [
        "proto/dir/v1/common.proto",
        "proto/dir/v1/store.proto",
        "proto/dir/v1/routing.proto",
        "proto/dir/v1/search.proto",
        "proto/dir/v1/publication.proto",
        "proto/dir/v1/sync.proto",
        "proto/dir/v1/sign.proto",
    ];
    for proto in &protos {
        println!("cargo:rerun-if-changed={proto}");
    }

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(&protos, &["proto"])?;

    Ok(())
}
