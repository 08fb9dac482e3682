use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tonic::{Code, Request, Response, Status, Streaming};

use crate::pb;

/// Metadata key: if present and non-zero, fail immediately with this status code.
const METADATA_FAIL_EARLY: &str = "fail-early";
/// Metadata key: if present and non-zero, fail with this status code after
/// the handler would otherwise have produced a result.
const METADATA_FAIL_LATE: &str = "fail-late";

fn parse_code(val: &str) -> Option<Code> {
    let n: i32 = val.parse().ok()?;
    if n == 0 {
        return None;
    }
    Some(code_from_i32(n))
}

fn code_from_i32(n: i32) -> Code {
    match n {
        0 => Code::Ok,
        1 => Code::Cancelled,
        2 => Code::Unknown,
        3 => Code::InvalidArgument,
        4 => Code::DeadlineExceeded,
        5 => Code::NotFound,
        6 => Code::AlreadyExists,
        7 => Code::PermissionDenied,
        8 => Code::ResourceExhausted,
        9 => Code::FailedPrecondition,
        10 => Code::Aborted,
        11 => Code::OutOfRange,
        12 => Code::Unimplemented,
        13 => Code::Internal,
        14 => Code::Unavailable,
        15 => Code::DataLoss,
        16 => Code::Unauthenticated,
        _ => Code::Unknown,
    }
}

struct Directives {
    fail_early: Option<Code>,
    fail_late: Option<Code>,
}

fn directives<T>(req: &Request<T>) -> Directives {
    let md = req.metadata();
    Directives {
        fail_early: md
            .get(METADATA_FAIL_EARLY)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_code),
        fail_late: md
            .get(METADATA_FAIL_LATE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_code),
    }
}

/// The fixed roster backing `GetUser`/`ListUsers`.
fn roster() -> &'static [(i32, &'static str, &'static str)] {
    &[
        (1, "Alice", "alice@example.com"),
        (2, "Bob", "bob@example.com"),
        (3, "Carol", "carol@example.com"),
        (4, "Dave", "dave@example.com"),
        (5, "Erin", "erin@example.com"),
    ]
}

type ListUsersStream = Pin<Box<dyn Stream<Item = Result<pb::User, Status>> + Send>>;
type EchoStream = Pin<Box<dyn Stream<Item = Result<pb::EchoReply, Status>> + Send>>;

pub struct VcrTestServiceImpl;

#[tonic::async_trait]
impl pb::vcr_test_service_server::VcrTestService for VcrTestServiceImpl {
    async fn get_user(&self, request: Request<pb::GetUserRequest>) -> Result<Response<pb::User>, Status> {
        let d = directives(&request);
        if let Some(code) = d.fail_early {
            return Err(Status::new(code, "fail"));
        }

        let id = request.into_inner().id;
        if id == 999 {
            return Err(Status::new(Code::NotFound, format!("User {id} not found")));
        }

        if let Some(code) = d.fail_late {
            return Err(Status::new(code, "fail"));
        }

        match roster().iter().find(|(rid, _, _)| *rid == id) {
            Some((rid, name, email)) => Ok(Response::new(pb::User {
                id: *rid,
                name: name.to_string(),
                email: email.to_string(),
            })),
            None => Ok(Response::new(pb::User {
                id,
                name: format!("User {id}"),
                email: format!("user{id}@example.com"),
            })),
        }
    }

    type ListUsersStream = ListUsersStream;

    async fn list_users(
        &self,
        request: Request<pb::ListUsersRequest>,
    ) -> Result<Response<Self::ListUsersStream>, Status> {
        let d = directives(&request);
        if let Some(code) = d.fail_early {
            return Err(Status::new(code, "fail"));
        }

        let limit = request.into_inner().limit.max(0) as usize;
        let users: Vec<pb::User> = roster()
            .iter()
            .take(limit)
            .map(|(id, name, email)| pb::User {
                id: *id,
                name: name.to_string(),
                email: email.to_string(),
            })
            .collect();

        let (tx, rx) = mpsc::channel(users.len().max(1));
        let fail_late = d.fail_late;
        tokio::spawn(async move {
            for user in users {
                if tx.send(Ok(user)).await.is_err() {
                    return;
                }
            }
            if let Some(code) = fail_late {
                let _ = tx.send(Err(Status::new(code, "fail"))).await;
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx)) as Self::ListUsersStream))
    }

    async fn sum_sizes(
        &self,
        request: Request<Streaming<pb::Chunk>>,
    ) -> Result<Response<pb::SumReply>, Status> {
        let d = directives(&request);
        if let Some(code) = d.fail_early {
            return Err(Status::new(code, "fail"));
        }

        let mut stream = request.into_inner();
        let mut total: i32 = 0;
        while let Some(chunk) = stream.next().await {
            total += chunk?.data.len() as i32;
        }

        if let Some(code) = d.fail_late {
            return Err(Status::new(code, "fail"));
        }

        Ok(Response::new(pb::SumReply { total_bytes: total }))
    }

    type EchoStream = EchoStream;

    async fn echo(
        &self,
        request: Request<Streaming<pb::EchoRequest>>,
    ) -> Result<Response<Self::EchoStream>, Status> {
        let d = directives(&request);
        if let Some(code) = d.fail_early {
            return Err(Status::new(code, "fail"));
        }

        let mut in_stream = request.into_inner();
        let mut texts = Vec::new();
        while let Some(msg) = in_stream.next().await {
            texts.push(msg?.text);
        }

        let fail_late = d.fail_late;
        let (tx, rx) = mpsc::channel(texts.len().max(1));
        tokio::spawn(async move {
            for text in texts {
                if tx.send(Ok(pb::EchoReply { text })).await.is_err() {
                    return;
                }
            }
            if let Some(code) = fail_late {
                let _ = tx.send(Err(Status::new(code, "fail"))).await;
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx)) as Self::EchoStream))
    }
}
