//! Generated client/server stubs for the directory core's six gRPC
//! services, compiled from `proto/dir/v1/*.proto` by `build.rs`.

pub mod dir {
    pub mod v1 {
        tonic::include_proto!("dir.v1");
    }
}

pub use dir::v1::*;
