use crate::clock::Clock;
use crate::decision::{Decision, DecisionEngine};
use crate::error::Result;
use crate::executor::{ActionExecutor, InputSink};
use fishctl_capture::{decode_sample, FrameSource, SourceEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub decode_errors: u64,
    pub idle_waits: u64,
    pub actions: u64,
}

/// Feed frames through the engine and executor until `running` is cleared or
/// the source ends.
///
/// Undecodable samples are logged and skipped. Source and input failures end
/// the loop with an error.
pub fn run_frame_loop<S, I, C>(
    source: &mut S,
    engine: &mut DecisionEngine,
    executor: &mut ActionExecutor<I, C>,
    running: &AtomicBool,
    timeout: Duration,
) -> Result<LoopSummary>
where
    S: FrameSource + ?Sized,
    I: InputSink,
    C: Clock,
{
    let mut summary = LoopSummary::default();

    while running.load(Ordering::SeqCst) {
        let sample = match source.next_sample(timeout)? {
            SourceEvent::Sample(sample) => sample,
            SourceEvent::Idle => {
                summary.idle_waits += 1;
                debug!(timeout_ms = timeout.as_millis() as u64, "no frame yet");
                continue;
            }
            SourceEvent::Ended => {
                info!("frame source ended");
                break;
            }
        };

        let frame = match decode_sample(&sample) {
            Ok(frame) => frame,
            Err(e) => {
                summary.decode_errors += 1;
                warn!(error = %e, format = %sample.format, "skipping frame");
                continue;
            }
        };
        summary.frames += 1;

        if let Decision::Act(actions) = engine.decide(&frame) {
            executor.execute_all(&actions)?;
            summary.actions += actions.len() as u64;
        }
    }

    Ok(summary)
}
