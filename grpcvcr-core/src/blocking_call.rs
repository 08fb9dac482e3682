//! Blocking-model counterparts of [`crate::fake_call`]'s synthesized calls.
//!
//! The blocking model runs entirely on the caller's thread (`spec.md` §5);
//! there is no suspension to model, so these are plain eager values with a
//! `get`/`Iterator` surface instead of `Future`/`Stream`.

use tonic::metadata::MetadataMap;
use tonic::{Code, Status};

fn to_status(code: Code, details: Option<&str>, trailing: &MetadataMap) -> Status {
    let mut status = Status::new(code, details.unwrap_or_default());
    *status.metadata_mut() = trailing.clone();
    status
}

/// A synthesized unary call for the blocking execution model.
pub struct BlockingUnaryCall<Resp> {
    outcome: std::result::Result<Resp, (Code, Option<String>)>,
    trailing_metadata: MetadataMap,
}

impl<Resp> BlockingUnaryCall<Resp> {
    pub fn ok(result: Resp, trailing_metadata: MetadataMap) -> Self {
        BlockingUnaryCall {
            outcome: Ok(result),
            trailing_metadata,
        }
    }

    pub fn error(code: Code, details: Option<String>, trailing_metadata: MetadataMap) -> Self {
        BlockingUnaryCall {
            outcome: Err((code, details)),
            trailing_metadata,
        }
    }

    pub fn code(&self) -> Code {
        match &self.outcome {
            Ok(_) => Code::Ok,
            Err((code, _)) => *code,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match &self.outcome {
            Ok(_) => None,
            Err((_, details)) => details.as_deref(),
        }
    }

    pub fn trailing_metadata(&self) -> &MetadataMap {
        &self.trailing_metadata
    }

    pub fn initial_metadata(&self) -> MetadataMap {
        MetadataMap::new()
    }

    pub fn cancelled(&self) -> bool {
        false
    }

    pub fn done(&self) -> bool {
        true
    }

    pub fn on_done<F: FnOnce()>(&self, f: F) {
        f();
    }

    /// Block for the result, consuming the call. The blocking model never
    /// actually blocks here since the value is already resolved.
    pub fn get(self) -> std::result::Result<Resp, Status> {
        let trailing = self.trailing_metadata.clone();
        self.outcome
            .map_err(|(code, details)| to_status(code, details.as_deref(), &trailing))
    }
}

/// A synthesized streaming call for the blocking execution model. Iterating
/// it drives no suspension; it is a plain `Iterator` over the recorded
/// messages followed by an optional terminal error.
pub struct BlockingStreamingCall<Resp> {
    messages: std::vec::IntoIter<Resp>,
    terminal_error: Option<(Code, Option<String>)>,
    code: Code,
    details: Option<String>,
    trailing_metadata: MetadataMap,
}

impl<Resp> BlockingStreamingCall<Resp> {
    pub fn new(
        messages: Vec<Resp>,
        code: Code,
        details: Option<String>,
        trailing_metadata: MetadataMap,
    ) -> Self {
        let terminal_error = if code != Code::Ok {
            Some((code, details.clone()))
        } else {
            None
        };
        BlockingStreamingCall {
            messages: messages.into_iter(),
            terminal_error,
            code,
            details,
            trailing_metadata,
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn trailing_metadata(&self) -> &MetadataMap {
        &self.trailing_metadata
    }

    pub fn initial_metadata(&self) -> MetadataMap {
        MetadataMap::new()
    }

    pub fn cancelled(&self) -> bool {
        false
    }
}

impl<Resp> Iterator for BlockingStreamingCall<Resp> {
    type Item = std::result::Result<Resp, Status>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(msg) = self.messages.next() {
            return Some(Ok(msg));
        }
        let (code, details) = self.terminal_error.take()?;
        let trailing = self.trailing_metadata.clone();
        Some(Err(to_status(code, details.as_deref(), &trailing)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unary_ok_returns_value() {
        let call = BlockingUnaryCall::ok("hi", MetadataMap::new());
        assert_eq!(call.get().unwrap(), "hi");
    }

    #[test]
    fn unary_error_returns_status() {
        let call: BlockingUnaryCall<()> =
            BlockingUnaryCall::error(Code::PermissionDenied, Some("nope".into()), MetadataMap::new());
        let err = call.get().unwrap_err();
        assert_eq!(err.code(), Code::PermissionDenied);
    }

    #[test]
    fn streaming_iterator_ends_with_error() {
        let call = BlockingStreamingCall::new(vec![1, 2], Code::Aborted, Some("retry".into()), MetadataMap::new());
        let items: Vec<_> = call.collect();
        assert_eq!(items.len(), 3);
        assert_eq!(*items[0].as_ref().unwrap(), 1);
        assert_eq!(*items[1].as_ref().unwrap(), 2);
        assert_eq!(items[2].as_ref().unwrap_err().code(), Code::Aborted);
    }

    #[test]
    fn streaming_iterator_clean_end() {
        let call = BlockingStreamingCall::new(vec![1], Code::Ok, None, MetadataMap::new());
        let items: Vec<_> = call.collect();
        assert_eq!(items.len(), 1);
    }
}
