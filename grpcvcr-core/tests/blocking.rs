//! Exercises the thread-per-call (blocking) wrapper against the same fixture
//! server, on a runtime separate from the one driving the test harness.

use tonic::metadata::MetadataMap;
use tonic::transport::Endpoint;

use fixture::pb;
use grpcvcr_core::{BlockingRecordingChannel, Cassette, Matcher, RecordMode};

const METHOD_GET_USER: &str = "/fixture.VcrTestService/GetUser";

#[test]
fn blocking_unary_record_then_replay() {
    let server_rt = tokio::runtime::Runtime::new().unwrap();
    let (addr, _server) = server_rt.block_on(fixture::spawn());
    let endpoint = Endpoint::from_shared(format!("http://{addr}")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cassette.yaml");

    let cassette = Cassette::open(&path, RecordMode::NewEpisodes, Matcher::default()).unwrap();
    let channel = BlockingRecordingChannel::connect(cassette, endpoint.clone()).unwrap();

    let user = channel
        .unary::<pb::GetUserRequest, pb::User>(METHOD_GET_USER, pb::GetUserRequest { id: 1 }, MetadataMap::new())
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(user.name, "Alice");
    channel.close().unwrap();

    let cassette = Cassette::open(&path, RecordMode::None, Matcher::default()).unwrap();
    let channel = BlockingRecordingChannel::connect(cassette, endpoint).unwrap();
    let replayed = channel
        .unary::<pb::GetUserRequest, pb::User>(METHOD_GET_USER, pb::GetUserRequest { id: 1 }, MetadataMap::new())
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(replayed, user);
}

#[test]
fn blocking_server_streaming_record_then_replay() {
    let server_rt = tokio::runtime::Runtime::new().unwrap();
    let (addr, _server) = server_rt.block_on(fixture::spawn());
    let endpoint = Endpoint::from_shared(format!("http://{addr}")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cassette.yaml");

    let cassette = Cassette::open(&path, RecordMode::NewEpisodes, Matcher::default()).unwrap();
    let channel = BlockingRecordingChannel::connect(cassette, endpoint.clone()).unwrap();
    let live: Vec<String> = channel
        .server_streaming::<pb::ListUsersRequest, pb::User>(
            "/fixture.VcrTestService/ListUsers",
            pb::ListUsersRequest { limit: 2 },
            MetadataMap::new(),
        )
        .unwrap()
        .map(|r| r.unwrap().name)
        .collect();
    assert_eq!(live, vec!["Alice", "Bob"]);
    channel.close().unwrap();

    let cassette = Cassette::open(&path, RecordMode::None, Matcher::default()).unwrap();
    let channel = BlockingRecordingChannel::connect(cassette, endpoint).unwrap();
    let replayed: Vec<String> = channel
        .server_streaming::<pb::ListUsersRequest, pb::User>(
            "/fixture.VcrTestService/ListUsers",
            pb::ListUsersRequest { limit: 2 },
            MetadataMap::new(),
        )
        .unwrap()
        .map(|r| r.unwrap().name)
        .collect();
    assert_eq!(replayed, live);
}
