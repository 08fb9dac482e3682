//! A small tonic server exercising all four gRPC call shapes, used only by
//! `grpcvcr-core`'s integration tests (`spec.md` places test-runner/fixture
//! integration out of the core's scope, but the core's own tests still need
//! something real to record against).

mod service;

pub mod pb {
    tonic::include_proto!("fixture");
}

use std::net::SocketAddr;

use tonic::transport::Server;

/// Spawns the fixture server on an ephemeral localhost port. The server runs
/// on a detached task until the returned handle is aborted or dropped.
pub async fn spawn() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("read local addr");

    let service = pb::vcr_test_service_server::VcrTestServiceServer::new(service::VcrTestServiceImpl);

    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(service)
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .expect("fixture server crashed");
    });

    (addr, handle)
}
