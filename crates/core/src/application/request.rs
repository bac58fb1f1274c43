//! Request Protocol - send the payload, read one response
//!
//! One request/response cycle on the bound connection: write exactly the
//! payload bytes, then a single blocking read into a bounded buffer. Whatever
//! that read returns is the response; there is no framing and no reassembly of
//! short or multi-packet replies. The connection is left open.

use crate::application::worker::constants::RESPONSE_BUFFER_SIZE;
use crate::port::{BoundQuery, ExecutionError, JobCallback, Response};
use tracing::{debug, info};

pub struct RequestProtocol {
    response_buffer: usize,
}

impl RequestProtocol {
    pub fn new(response_buffer: usize) -> Self {
        Self {
            response_buffer: response_buffer.max(1),
        }
    }
}

impl Default for RequestProtocol {
    fn default() -> Self {
        Self::new(RESPONSE_BUFFER_SIZE)
    }
}

impl JobCallback for RequestProtocol {
    fn call(&self, bound: &mut BoundQuery<'_>) -> Result<Response, ExecutionError> {
        let payload = bound.query().payload().clone();
        let worker = bound.query().logical_id();
        let session = bound.connection().session_id();

        info!(
            worker = ?worker,
            session = %session,
            payload = %payload.to_string_lossy(),
            "Sending query"
        );
        bound
            .connection()
            .send(payload.as_bytes())
            .map_err(|e| ExecutionError::Send(e.to_string()))?;
        debug!(session = %session, len = payload.len(), "Send done");

        let mut buf = vec![0u8; self.response_buffer];
        let n = bound
            .connection()
            .recv(&mut buf)
            .map_err(|e| ExecutionError::Receive(e.to_string()))?;
        if n == 0 {
            return Err(ExecutionError::ConnectionClosed);
        }
        buf.truncate(n);

        let response = Response::new(buf);
        info!(
            session = %session,
            bytes = n,
            response = %response.to_string_lossy(),
            "Received response"
        );
        Ok(response)
    }
}
