//! Scripted decode traces.
//!
//! Each test replays a fixed interleaving of upstream events and decode
//! completions against a real `PnmFactory` on a `ManualScheduler`, then
//! snapshots what the task emitted, what it asked the scheduler to do,
//! and where it ended up.
//!
//! The fixture is a 4x3 graymap: an 11-byte header followed by three
//! 4-byte rows, so prefixes of 15, 19 and 23 bytes hold 1, 2 and 3 rows.

use insta::assert_snapshot;
use trickle_decoder::PnmFactory;
use trickle_task::TaskConfig;
use trickle_tests::{Step, describe_image, graymap, replay};

fn image() -> Vec<u8> {
    let image = graymap(4, 3);
    assert_eq!(image.len(), 23);
    image
}

fn trace(config: TaskConfig, steps: Vec<Step>) -> String {
    replay(PnmFactory, config, steps).trace(describe_image)
}

fn progressive(steps: Vec<Step>) -> String {
    trace(TaskConfig::default(), steps)
}

// ── Happy paths ───────────────────────────────────────────────────────────────

#[test]
fn every_row_decoded_as_it_arrives() {
    let img = image();
    let out = progressive(vec![
        Step::partial(&img[..15]),
        Step::Run,
        Step::partial(&img[..19]),
        Step::Run,
        Step::complete(&img),
        Step::Run,
    ]);
    assert_snapshot!(out, @r"
    preview 4x3x1 rows 1/3
    preview 4x3x1 rows 2/3
    final 4x3x1 rows 3/3
    --
    submit 0, run 0, submit 1, run 1, submit 2, run 2
    Completed: received 3, dropped 0, stale 0, factory 1
    ");
}

#[test]
fn chunk_arriving_mid_decode_is_dropped() {
    let img = image();
    let out = progressive(vec![
        Step::partial(&img[..15]),
        Step::partial(&img[..19]),
        Step::Run,
        Step::complete(&img),
        Step::Run,
    ]);
    assert_snapshot!(out, @r"
    preview 4x3x1 rows 1/3
    final 4x3x1 rows 3/3
    --
    submit 0, run 0, submit 1, run 1
    Completed: received 3, dropped 1, stale 0, factory 1
    ");
}

#[test]
fn header_split_across_chunks() {
    let img = image();
    let out = progressive(vec![
        Step::partial(&img[..5]),
        Step::partial(&img[..11]),
        Step::Run,
        Step::partial(&img[..15]),
        Step::Run,
        Step::complete(&img),
        Step::Run,
    ]);
    assert_snapshot!(out, @r"
    preview 4x3x1 rows 1/3
    final 4x3x1 rows 3/3
    --
    submit 0, run 0, submit 1, run 1, submit 2, run 2
    Completed: received 4, dropped 0, stale 0, factory 2
    ");
}

#[test]
fn progressive_off_decodes_once() {
    let img = image();
    let out = trace(
        TaskConfig {
            progressive_decoding: false,
        },
        vec![
            Step::partial(&img[..15]),
            Step::partial(&img[..19]),
            Step::complete(&img),
            Step::Run,
        ],
    );
    assert_snapshot!(out, @r"
    final 4x3x1 rows 3/3
    --
    submit 0, run 0
    Completed: received 3, dropped 2, stale 0, factory 1
    ");
}

// ── Final data overtaking a preview ───────────────────────────────────────────

#[test]
fn final_data_cancels_queued_preview() {
    let img = image();
    let out = progressive(vec![
        Step::partial(&img[..15]),
        Step::complete(&img),
        Step::Run,
        Step::Run,
    ]);
    assert_snapshot!(out, @r"
    final 4x3x1 rows 3/3
    --
    submit 0, cancel 0, submit 1, skip 0, run 1
    Completed: received 2, dropped 0, stale 0, factory 1
    ");
}

#[test]
fn preview_finishing_after_cancel_is_discarded() {
    let img = image();
    let out = progressive(vec![
        Step::partial(&img[..15]),
        Step::complete(&img),
        Step::RunCancelled,
        Step::Run,
    ]);
    assert_snapshot!(out, @r"
    final 4x3x1 rows 3/3
    --
    submit 0, cancel 0, submit 1, run 0, run 1
    Completed: received 2, dropped 0, stale 1, factory 1
    ");
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[test]
fn truncated_file_fails_after_preview() {
    let img = image();
    let out = progressive(vec![
        Step::partial(&img[..15]),
        Step::Run,
        Step::complete(&img[..19]),
        Step::Run,
    ]);
    assert_snapshot!(out, @r"
    preview 4x3x1 rows 1/3
    error decoding failed: decoder produced no artifact from the final buffer
    --
    submit 0, run 0, submit 1, run 1
    Failed: received 2, dropped 0, stale 0, factory 1
    ");
}

#[test]
fn unrecognized_data_fails_without_decoding() {
    let out = progressive(vec![Step::complete(b"GIF89a\x01\x00\x01\x00")]);
    assert_snapshot!(out, @r"
    error decoding failed: no decoder could be created for the data
    --
    no decodes
    Failed: received 1, dropped 0, stale 0, factory 1
    ");
}

#[test]
fn empty_download_fails() {
    let out = progressive(vec![Step::complete(b"")]);
    assert_snapshot!(out, @r"
    error decoding failed: final buffer is empty
    --
    no decodes
    Failed: received 1, dropped 0, stale 0, factory 0
    ");
}

#[test]
fn upstream_failure_cancels_pending_decode() {
    let img = image();
    let out = progressive(vec![
        Step::partial(&img[..15]),
        Step::Fail("connection reset"),
        Step::Run,
    ]);
    assert_snapshot!(out, @r"
    error upstream failed: connection reset
    --
    submit 0, cancel 0, skip 0
    Failed: received 1, dropped 0, stale 0, factory 1
    ");
}

// ── Cancellation ──────────────────────────────────────────────────────────────

#[test]
fn cancelled_task_ignores_everything_after() {
    let img = image();
    let out = progressive(vec![
        Step::partial(&img[..15]),
        Step::Cancel,
        Step::Run,
        Step::complete(&img),
    ]);
    assert_snapshot!(out, @r"
    --
    submit 0, cancel 0, skip 0
    Cancelled: received 1, dropped 0, stale 0, factory 1
    ");
}
