//! Playback scenarios on the paused tokio clock

use super::*;
use crate::broadcast::BroadcastWriter;
use crate::error::ReplayError;
use crate::fit::profile::{TIMESTAMP_FIELD, mesg, record};
use crate::test_utils::{FitFileBuilder, RIDE_FIELDS, ride_file};
use crate::types::BaseType;
use serde_json::Value as Json;
use std::collections::VecDeque;
use std::path::Path;

/// One call to [`Broadcaster::publish`].
#[derive(Debug, Clone)]
struct Emission {
    sample: RideSample,
    elapsed: Duration,
    at: Instant,
    /// Published document, when recording through a real writer
    document: Option<Json>,
}

/// Broadcaster that records every emission, optionally writing through a [`BroadcastWriter`]
/// and cancelling after a fixed number of emissions.
#[derive(Default)]
struct Recorder {
    writer: Option<BroadcastWriter>,
    emissions: Vec<Emission>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl Recorder {
    fn writing_to(path: &Path) -> Self {
        Self { writer: Some(BroadcastWriter::new(path)), ..Self::default() }
    }

    fn cancelling_after(count: usize, token: CancellationToken) -> Self {
        Self { cancel_after: Some((count, token)), ..Self::default() }
    }

    fn offsets(&self, start: Instant) -> Vec<Duration> {
        self.emissions.iter().map(|e| e.at - start).collect()
    }

    fn timestamps(&self) -> Vec<u32> {
        self.emissions.iter().map(|e| e.sample.timestamp).collect()
    }
}

impl Broadcaster for Recorder {
    fn publish(&mut self, sample: &RideSample, elapsed: Duration) -> Result<()> {
        let document = match &mut self.writer {
            Some(writer) => {
                writer.publish(sample, elapsed)?;
                let text = std::fs::read_to_string(writer.target()).expect("published file");
                Some(serde_json::from_str(&text).expect("published JSON"))
            }
            None => None,
        };
        self.emissions.push(Emission { sample: *sample, elapsed, at: Instant::now(), document });
        if let Some((count, token)) = &self.cancel_after {
            if self.emissions.len() == *count {
                token.cancel();
            }
        }
        Ok(())
    }
}

/// Provider over a fixed list of samples.
struct VecProvider(VecDeque<RideSample>);

#[async_trait::async_trait]
impl SampleProvider for VecProvider {
    async fn next_sample(&mut self) -> Result<Option<RideSample>> {
        Ok(self.0.pop_front())
    }

    fn name(&self) -> &str {
        "vec"
    }
}

fn memory(name: &str, bytes: Vec<u8>) -> RideInput {
    RideInput::memory(name, bytes)
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

#[tokio::test(start_paused = true)]
async fn paces_samples_and_publishes_each_one() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = tempfile::tempdir()?;
    let target = dir.path().join("focus.json");
    let input = memory("ride", ride_file(&[(1_000, Some(200)), (1_001, Some(210)), (1_003, None)]));

    let start = Instant::now();
    let mut scheduler = Scheduler::new(Recorder::writing_to(&target), CancellationToken::new());
    let outcome = scheduler.run(&[input]).await?;

    assert_eq!(
        outcome,
        PlaybackOutcome::Completed(PlaybackSummary { files: 1, samples: 3, elapsed: Duration::from_secs(3) })
    );
    let recorder = scheduler.broadcaster();
    assert_eq!(recorder.offsets(start), secs(&[0, 1, 3]));
    assert_eq!(recorder.emissions.iter().map(|e| e.elapsed).collect::<Vec<_>>(), secs(&[0, 1, 3]));

    let docs: Vec<&Json> = recorder.emissions.iter().filter_map(|e| e.document.as_ref()).collect();
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0][0]["power"], 200);
    assert_eq!(docs[0][0]["time"], 0);
    assert_eq!(docs[1][0]["power"], 210);
    assert_eq!(docs[1][0]["time"], 1);
    assert!(docs[2][0].get("power").is_none(), "absent power must be omitted");
    assert_eq!(docs[2][0]["time"], 3);
    assert_eq!(docs[2][0]["maxPower"], 210);
    assert_eq!(docs[2][0]["cadence"], 90);

    assert_eq!(scheduler.state().published, 3);
    assert_eq!(scheduler.state().last_sample.map(|s| s.timestamp), Some(1_003));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn files_play_back_to_back_with_fresh_definitions() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let first = ride_file(&[(100, Some(150)), (102, Some(160))]);

    // Reuses local 1 with a different field order and local 0 for the record message itself.
    let second = FitFileBuilder::new()
        .define(1, mesg::FILE_ID, &[(0, BaseType::Enum)])
        .data(1, &[4])
        .define(0, mesg::RECORD, &[(record::POWER, BaseType::UInt16), (TIMESTAMP_FIELD, BaseType::UInt32)])
        .data(0, &[300, 5_000])
        .data(0, &[310, 5_001])
        .build();

    let start = Instant::now();
    let mut scheduler = Scheduler::new(Recorder::default(), CancellationToken::new());
    let outcome = scheduler.run(&[memory("first", first), memory("second", second)]).await?;

    assert_eq!(outcome.summary().files, 2);
    assert_eq!(outcome.summary().samples, 4);
    let recorder = scheduler.broadcaster();
    assert_eq!(recorder.timestamps(), vec![100, 102, 5_000, 5_001]);
    assert_eq!(recorder.offsets(start), secs(&[0, 2, 2, 3]));
    let powers: Vec<_> = recorder.emissions.iter().map(|e| e.sample.power).collect();
    assert_eq!(powers, vec![Some(150), Some(160), Some(300), Some(310)]);
    assert_eq!(scheduler.state().file_index, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn definitions_do_not_leak_between_files() {
    let _ = tracing_subscriber::fmt::try_init();
    let first = ride_file(&[(100, Some(150))]);

    // Data record for local 1, which only the first file defines.
    let record_size: usize = RIDE_FIELDS.iter().map(|(_, base)| base.size()).sum();
    let mut orphan = vec![0x01];
    orphan.extend(std::iter::repeat_n(0u8, record_size));
    let second = FitFileBuilder::new().raw(&orphan).build();

    let mut scheduler = Scheduler::new(Recorder::default(), CancellationToken::new());
    let result = scheduler.run(&[memory("first", first), memory("second", second)]).await;

    match result {
        Err(ReplayError::UnknownDefinition { local_id, .. }) => assert_eq!(local_id, 1),
        other => panic!("Expected UnknownDefinition, got {other:?}"),
    }
    assert_eq!(scheduler.broadcaster().timestamps(), vec![100]);
}

#[tokio::test(start_paused = true)]
async fn files_without_samples_are_skipped() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let empty = FitFileBuilder::new().build();
    let only_file_id = FitFileBuilder::new().define(0, mesg::FILE_ID, &[(0, BaseType::Enum)]).data(0, &[4]).build();
    let inputs = [
        memory("a", ride_file(&[(10, Some(100))])),
        memory("empty", empty),
        memory("file-id-only", only_file_id),
        memory("b", ride_file(&[(20, Some(200)), (21, Some(210))])),
    ];

    let start = Instant::now();
    let mut scheduler = Scheduler::new(Recorder::default(), CancellationToken::new());
    let outcome = scheduler.run(&inputs).await?;

    assert_eq!(
        outcome,
        PlaybackOutcome::Completed(PlaybackSummary { files: 4, samples: 3, elapsed: Duration::from_secs(1) })
    );
    assert_eq!(scheduler.broadcaster().offsets(start), secs(&[0, 0, 1]));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn backwards_timestamps_emit_without_delay() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let samples = [10, 12, 11, 13].map(RideSample::at);
    let mut provider = VecProvider(samples.into_iter().collect());

    let start = Instant::now();
    let mut scheduler = Scheduler::new(Recorder::default(), CancellationToken::new());
    let outcome = scheduler.play_provider(&mut provider).await?;

    assert_eq!(outcome, ProviderOutcome::Exhausted(4));
    assert_eq!(scheduler.broadcaster().timestamps(), vec![10, 12, 11, 13]);
    assert_eq!(scheduler.broadcaster().offsets(start), secs(&[0, 2, 2, 4]));
    assert_eq!(scheduler.state().elapsed, Duration::from_secs(4));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_before_the_next_emission() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let cancel = CancellationToken::new();
    let input = memory("ride", ride_file(&[(0, Some(1)), (1, Some(2)), (2, Some(3)), (3, Some(4))]));

    let mut scheduler = Scheduler::new(Recorder::cancelling_after(2, cancel.clone()), cancel);
    let outcome = scheduler.run(&[input]).await?;

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.summary().samples, 2);
    assert_eq!(outcome.summary().files, 0);
    assert_eq!(scheduler.broadcaster().timestamps(), vec![0, 1]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_wait() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let cancel = CancellationToken::new();
    let input = memory("ride", ride_file(&[(0, Some(1)), (1, Some(2)), (60, Some(3))]));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let mut scheduler = Scheduler::new(Recorder::default(), cancel);
    let outcome = scheduler.run(&[input]).await?;

    assert!(outcome.is_cancelled());
    assert_eq!(scheduler.broadcaster().timestamps(), vec![0, 1]);
    assert_eq!(Instant::now() - start, Duration::from_millis(1_500));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancelled_token_publishes_nothing() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut scheduler = Scheduler::new(Recorder::default(), cancel);
    let outcome = scheduler.run(&[memory("ride", ride_file(&[(0, Some(1))]))]).await?;

    assert_eq!(
        outcome,
        PlaybackOutcome::Cancelled(PlaybackSummary { files: 0, samples: 0, elapsed: Duration::ZERO })
    );
    assert!(scheduler.broadcaster().emissions.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn decode_errors_abort_the_run() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut corrupt = ride_file(&[(50, Some(100)), (51, Some(110))]);
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0xFF;

    let mut scheduler = Scheduler::new(Recorder::default(), CancellationToken::new());
    let result = scheduler
        .run(&[memory("good", ride_file(&[(1, Some(90))])), memory("corrupt", corrupt)])
        .await;

    assert!(matches!(result, Err(ReplayError::CrcMismatch { .. })), "got {result:?}");
    // The corrupt file's samples precede its checksum, so they were already published.
    assert_eq!(scheduler.broadcaster().timestamps(), vec![1, 50, 51]);
}

#[tokio::test(start_paused = true)]
async fn publish_errors_abort_the_run() {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("missing").join("focus.json");

    let mut scheduler = Scheduler::new(BroadcastWriter::new(&target), CancellationToken::new());
    let result = scheduler.run(&[memory("ride", ride_file(&[(0, Some(1)), (1, Some(2))]))]).await;

    assert!(matches!(result, Err(ReplayError::Publish { .. })), "got {result:?}");
    assert_eq!(scheduler.state().published, 0);
}

#[tokio::test(start_paused = true)]
async fn replay_validates_config_and_writes_output() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("ride.fit");
    let output = dir.path().join("focus.json");
    std::fs::write(&input, ride_file(&[(0, Some(120)), (5, Some(240))]))?;

    let config = ReplayConfig::new([&input]).with_output(&output);
    let outcome = replay(&config, CancellationToken::new()).await?;
    assert_eq!(outcome.summary().elapsed, Duration::from_secs(5));

    let doc: Json = serde_json::from_str(&std::fs::read_to_string(&output)?)?;
    assert_eq!(doc[0]["power"], 240);
    assert_eq!(doc[0]["avgPower"], 180);
    assert_eq!(doc[0]["time"], 5);

    let empty = ReplayConfig::new(Vec::<std::path::PathBuf>::new());
    assert!(matches!(replay(&empty, CancellationToken::new()).await, Err(ReplayError::Config { .. })));
    Ok(())
}
