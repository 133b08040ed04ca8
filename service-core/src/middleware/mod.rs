pub mod tracing;

pub use self::tracing::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
