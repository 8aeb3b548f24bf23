//! Bridge diagnostics routed through the pipeline they describe

use log_pipeline::{ConsumerState, Logger, LoggerConfig};
use log_transport::MockTransport;
use std::time::{Duration, Instant};
use usb_logger::init_logging;

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn delivered_text(transport: &MockTransport) -> String {
    String::from_utf8_lossy(&transport.delivered().concat()).into_owned()
}

#[test]
fn test_trace_level_subscriber_lets_drain_go_idle() {
    let transport = MockTransport::new();
    let config = LoggerConfig {
        queue_depth: 64,
        ..LoggerConfig::default()
    };
    let logger = Logger::init(config, transport.clone()).unwrap();
    init_logging(logger.writer(), "trace").unwrap();

    tracing::trace!("bridge trace line");
    logger.write(b"one line\n").unwrap();

    assert!(wait_for(|| {
        let text = delivered_text(&transport);
        text.contains("bridge trace line") && text.contains("one line")
    }));
    assert!(wait_for(|| logger.state() == ConsumerState::Suspended && logger.writer().queued() == 0));

    // No frame generates further frames
    let settled = transport.delivered().len();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(transport.delivered().len(), settled);
    assert_eq!(logger.state(), ConsumerState::Suspended);
    assert_eq!(logger.stats().frames_dropped, 0);

    logger.shutdown().unwrap();
}
