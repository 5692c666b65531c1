//! Protocol type tests
//!
//! Header construction, sequence generation and error classification working
//! together.

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashSet;

    #[test]
    fn test_header_creation() {
        let header = InvocationHeader::new("Arith.Multiply", 42);
        assert_eq!(header.service_method, "Arith.Multiply");
        assert_eq!(header.seq, 42);
    }

    #[test]
    fn test_sequence_uniqueness() {
        let seqs: HashSet<_> = (0..1000).map(|_| next_sequence()).collect();
        assert_eq!(seqs.len(), 1000, "All sequence numbers should be unique");
    }

    #[test]
    fn test_sequence_uniqueness_under_stress() {
        use std::sync::{Arc, Mutex};
        use std::thread;

        let seqs = Arc::new(Mutex::new(HashSet::new()));
        let mut handles = vec![];

        for _ in 0..8 {
            let seqs = Arc::clone(&seqs);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    let seq = next_sequence();
                    assert!(seqs.lock().unwrap().insert(seq), "Duplicate sequence: {}", seq);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seqs.lock().unwrap().len(), 4000);
    }

    #[test]
    fn test_reply_mirrors_request() {
        let request = InvocationHeader::new("Arith.Divide", 9);
        let reply = ReplyHeader::failure(&request, "divide by zero", FailureOrigin::Method);
        assert_eq!(reply.service_method, request.service_method);
        assert_eq!(reply.seq, request.seq);

        let err = reply.to_error("req-9").unwrap();
        assert_eq!(err.message(), "divide by zero");
        assert_eq!(err.request_id(), "req-9");
    }

    #[test]
    fn test_fault_round_trips_through_classification() {
        let fault = PlatformFault::new("Task timed out after 3.00 seconds", PlatformErrorKind::Error);
        let err = PlatformFault::classify(&fault.to_json());
        assert!(err.is_platform_error());
        assert_eq!(err.request_id(), UNKNOWN_REQUEST_ID);
    }
}
