#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use trickle_decoder::{Decoder, FnFactory};
use trickle_task::{
    IncrementalDecodeTask, ManualScheduler, TaskConfig, TaskMessage, TaskState, UpstreamSignal,
};
use trickle_types::{
    DecodeContext, DecodeEvent, Outcome, RequestDescriptor, ResponseMetadata, UpstreamError,
};

// Fuzz target: the decode task under arbitrary interleavings.
//
// Upstream deliveries, decode runs (including runs of already-cancelled
// work), upstream failures and cancellation are applied in the order the
// fuzzer picks. Afterwards the emitted outcomes must satisfy:
// - at most one terminal outcome, and only as the last one
// - nothing at all after a cancellation
// - at most one decode in flight at any time
// - the final state agrees with the terminal outcome
#[derive(Arbitrary, Debug)]
enum Op {
    Deliver { extra: Vec<u8>, is_final: bool },
    Run,
    RunCancelled,
    Fail,
    Cancel,
}

#[derive(Arbitrary, Debug)]
struct Input {
    progressive: bool,
    ops: Vec<Op>,
}

/// Decodes to the buffer length, except lengths divisible by three.
struct LenDecoder;

impl Decoder for LenDecoder {
    type Output = usize;

    fn decode(&mut self, buffer: &Bytes, _: Option<&ResponseMetadata>, _: bool) -> Option<usize> {
        (buffer.len() % 3 != 0).then_some(buffer.len())
    }
}

fuzz_target!(|input: Input| {
    let scheduler = ManualScheduler::new();
    // Refuses buffers starting with an odd byte.
    let factory = FnFactory::new(|ctx: &DecodeContext| {
        ctx.buffer.first().is_some_and(|b| b % 2 == 0).then_some(LenDecoder)
    });
    let (mut task, mut channels) = IncrementalDecodeTask::new(
        RequestDescriptor::new("fuzz://sequence"),
        TaskConfig {
            progressive_decoding: input.progressive,
        },
        Arc::new(factory),
        Arc::new(scheduler.clone()),
    );

    let mut buffer = Vec::new();
    let mut cancelled_at = None;
    let mut outcomes = Vec::new();

    for op in input.ops {
        match op {
            Op::Deliver { extra, is_final } => {
                buffer.extend_from_slice(&extra);
                let event = if is_final {
                    DecodeEvent::complete(buffer.clone())
                } else {
                    DecodeEvent::partial(buffer.clone())
                };
                task.handle(UpstreamSignal::Data(event).into());
            }
            Op::Run => {
                scheduler.run_next();
            }
            Op::RunCancelled => {
                scheduler.run_next_even_if_cancelled();
            }
            Op::Fail => task.handle(UpstreamSignal::Failed(UpstreamError::failed("fuzz")).into()),
            Op::Cancel => {
                if !task.is_finished() && cancelled_at.is_none() {
                    cancelled_at = Some(outcomes.len());
                }
                task.handle(TaskMessage::Cancel);
            }
        }
        while let Ok(message) = channels.mailbox.try_recv() {
            task.handle(message);
        }
        while let Ok(outcome) = channels.outcomes.try_recv() {
            outcomes.push(outcome);
        }
        assert!(scheduler.pending() <= 1, "more than one decode in flight");
    }

    if let Some(at) = cancelled_at {
        assert_eq!(outcomes.len(), at, "outcome emitted after cancel");
        assert_eq!(task.state(), TaskState::Cancelled);
    }

    let terminals = outcomes.iter().filter(|o| o.is_terminal()).count();
    assert!(terminals <= 1);
    if terminals == 1 {
        assert!(outcomes.last().is_some_and(Outcome::is_terminal));
    }

    match outcomes.last() {
        Some(Outcome::Value { is_final: true, .. }) => assert_eq!(task.state(), TaskState::Completed),
        Some(Outcome::Error(_)) => assert_eq!(task.state(), TaskState::Failed),
        _ => assert!(!matches!(task.state(), TaskState::Completed | TaskState::Failed)),
    }
});
